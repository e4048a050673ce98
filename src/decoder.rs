use std::env::{self, JoinPathsError};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use crate::error::InstallError;

/// Input options making ffmpeg reconnect on transient network failures.
pub const RECONNECT_ARGS: [&str; 6] = [
    "-reconnect", "1",
    "-reconnect_streamed", "1",
    "-reconnect_delay_max", "5"
];

/// Prebuilt static ffmpeg used when installing on Windows.
pub const WINDOWS_BUILD_URL: &str =
    "https://github.com/BtbN/FFmpeg-Builds/releases/download/latest/ffmpeg-master-latest-win64-gpl.zip";

const WINDOWS_BINARIES: [&str; 3] = ["ffmpeg.exe", "ffplay.exe", "ffprobe.exe"];

/// Builds the ffmpeg invocation decoding `stream_url` into 48kHz stereo wav on stdout.
pub fn command(stream_url: &str) -> Command {
    let mut cmd = Command::new("ffmpeg");

    cmd.args(RECONNECT_ARGS)
        .args(["-i", stream_url])
        .args(["-vn", "-f", "wav", "-ac", "2", "-ar", "48000", "-acodec", "pcm_s16le"])
        .args(["-loglevel", "error", "pipe:1"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    cmd
}

/// Starts decoding `stream_url`.
pub fn spawn(stream_url: &str) -> std::io::Result<Child> {
    command(stream_url).spawn()
}

pub async fn is_ffmpeg_installed() -> bool {
    tokio::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Makes sure ffmpeg can be run, trying to install it if it can't. Returns
/// whether ffmpeg is usable afterwards.
pub async fn ensure_ffmpeg() -> bool {
    info!("Checking FFmpeg installation...");

    if is_ffmpeg_installed().await {
        info!("FFmpeg is already installed and accessible.");
        return true;
    }

    warn!("FFmpeg not found. Attempting to install...");

    let installed = match env::consts::OS {
        "windows" => match install_windows().await {
            Ok(dir) => {
                info!("FFmpeg unpacked to {}", dir.display());
                info!("Note: You may need to add this directory to your PATH permanently");
                true
            },
            Err(e) => {
                error!("Error installing FFmpeg: {e}");
                false
            }
        },
        os => install_with_package_manager(os).await
    };

    if !installed {
        return false;
    }

    if is_ffmpeg_installed().await {
        info!("FFmpeg successfully installed");
        true
    } else {
        error!("FFmpeg installation failed verification");
        false
    }
}

async fn install_with_package_manager(os: &str) -> bool {
    let Some(steps) = install_steps(os, |name| find_on_path(name).is_some()) else {
        error!("Don't know how to install FFmpeg on {os}, please install it manually");
        return false;
    };

    for step in steps {
        info!("Installing FFmpeg using: {}", step.join(" "));

        let status = tokio::process::Command::new(step[0])
            .args(&step[1..])
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {},
            Ok(status) => {
                error!("`{}` exited with {status}, you may need to install FFmpeg manually", step.join(" "));
                return false;
            },
            Err(e) => {
                error!("Error installing FFmpeg: {e}");
                return false;
            }
        }
    }

    true
}

/// Downloads the prebuilt Windows build, copies its binaries next to the
/// running executable and puts them on this process' `PATH`.
async fn install_windows() -> Result<PathBuf, InstallError> {
    let staging = env::temp_dir().join(format!("radio-relay-ffmpeg-{}", Uuid::new_v4()));
    tokio::fs::create_dir_all(&staging).await?;

    let result = unpack_windows_build(&staging).await;

    if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
        debug!("Failed to clean up {}: {e}", staging.display());
    }

    result
}

async fn unpack_windows_build(staging: &Path) -> Result<PathBuf, InstallError> {
    info!("Downloading FFmpeg from {WINDOWS_BUILD_URL}...");

    let archive = reqwest::get(WINDOWS_BUILD_URL).await?
        .error_for_status()?
        .bytes()
        .await?;
    let zip_path = staging.join("ffmpeg.zip");
    tokio::fs::write(&zip_path, &archive).await?;

    // Windows ships bsdtar, which reads zip archives.
    let status = tokio::process::Command::new("tar")
        .arg("-xf")
        .arg(&zip_path)
        .arg("-C")
        .arg(staging)
        .status()
        .await?;

    if !status.success() {
        return Err(InstallError::Extract(status));
    }

    let bin_dir = find_file(staging, "ffmpeg.exe")
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .ok_or(InstallError::MissingBinary)?;

    let target = env::current_exe()?
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
        .join("ffmpeg");
    tokio::fs::create_dir_all(&target).await?;

    for exe in WINDOWS_BINARIES {
        let binary = bin_dir.join(exe);
        if binary.is_file() {
            tokio::fs::copy(&binary, target.join(exe)).await?;
        }
    }

    env::set_var("PATH", path_with(env::var_os("PATH"), &target)?);
    Ok(target)
}

/// Depth first search for a file called `name` below `dir`.
fn find_file(dir: &Path, name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_dir() {
            subdirs.push(path);
        } else if entry.file_name() == name {
            return Some(path);
        }
    }

    subdirs.iter().find_map(|sub| find_file(sub, name))
}

/// `existing` with `dir` appended, unless it is already listed.
fn path_with(existing: Option<OsString>, dir: &Path) -> Result<OsString, JoinPathsError> {
    let mut paths = existing.as_deref()
        .map(|p| env::split_paths(p).collect::<Vec<_>>())
        .unwrap_or_default();

    if !paths.iter().any(|p| p == dir) {
        paths.push(dir.to_path_buf());
    }

    env::join_paths(paths)
}

/// Package manager commands installing ffmpeg on `os`, given which tools are
/// available. Windows is handled by [`install_windows`] instead.
fn install_steps(os: &str, available: impl Fn(&str) -> bool) -> Option<Vec<Vec<&'static str>>> {
    match os {
        "linux" => {
            if available("apt-get") {
                Some(vec![
                    vec!["sudo", "apt-get", "update"],
                    vec!["sudo", "apt-get", "install", "-y", "ffmpeg"]
                ])
            } else if available("dnf") {
                Some(vec![vec!["sudo", "dnf", "install", "-y", "ffmpeg"]])
            } else if available("yum") {
                Some(vec![vec!["sudo", "yum", "install", "-y", "ffmpeg"]])
            } else if available("pacman") {
                Some(vec![vec!["sudo", "pacman", "-S", "--noconfirm", "ffmpeg"]])
            } else {
                None
            }
        },
        "macos" if available("brew") => Some(vec![
            vec!["brew", "update"],
            vec!["brew", "install", "ffmpeg"]
        ]),
        _ => None
    }
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;

    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
