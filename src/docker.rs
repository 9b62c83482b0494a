use std::error::Error;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

use crate::util::CommandExt;
use crate::Opt;

pub(crate) fn build_args(
    project_dir: &Path,
    cargo_registry: &Path,
    volume: Option<&str>,
    opt: &Opt,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "run".into(),
        "--rm".into(),
        "-v".into(),
        format!("{}:/code", project_dir.display()),
    ];

    if let Some(volume) = volume {
        args.push("-v".into());
        args.push(format!("{}:/build-volume", volume));
        args.push("-v".into());
        args.push(format!("{}:/root/.cargo/registry", volume));
    } else {
        args.push("-v".into());
        args.push(format!("{}:/root/.cargo/registry", cargo_registry.display()));
    }

    args.push("-e".into());
    args.push(format!("BIN={}", opt.bin));

    if opt.keep_debug_info {
        args.push("-e".into());
        args.push("DEBUGINFO=1".into());
    }

    for env in &opt.env {
        args.push("-e".into());
        args.push(env.clone());
    }

    args.push(opt.docker_image.clone());
    args
}

pub fn build(args: &[String]) -> Result<(), Box<dyn Error>> {
    log::debug!("docker {}", args.join(" "));
    if Command::new("docker").args(args).status_bool() {
        Ok(())
    } else {
        Err("Running docker failed, check output above".into())
    }
}

pub fn manage_build_volume(name: &str) -> Result<(), Box<dyn Error>> {
    let exists = Command::new("docker")
        .args(&["volume", "inspect", name])
        .status_bool();

    if exists {
        return Ok(());
    }
    println!("Didn't find build volume {}, creating it", name);

    let created = Command::new("docker")
        .args(&["volume", "create", name])
        .status_bool();

    if created {
        println!("Created docker volume {}", name);
        Ok(())
    } else {
        Err(format!("Failed to create docker build volume {}", name).into())
    }
}

pub fn check() -> Result<(), Box<dyn Error>> {
    match Command::new("docker").args(&["--version"]).output() {
        Ok(ref output) if output.status.success() => Ok(()),
        e => Err(format!("Docker missing, executing docker --version failed with {:?}", e).into()),
    }
}

/// Name of the persistent build volume, only when `--use-build-volume` is set.
pub(crate) fn build_volume(opt: &Opt, project_dir: &Path) -> Result<Option<String>, Box<dyn Error>> {
    if opt.use_build_volume {
        build_volume_name(project_dir).map(Some)
    } else {
        Ok(None)
    }
}

pub fn build_volume_name(project_dir: &Path) -> Result<String, Box<dyn Error>> {
    let basename = project_dir
        .file_name()
        .and_then(OsStr::to_str)
        .ok_or_else(|| format!("Can't get basename from {}", project_dir.display()))?;
    Ok(format!("rust-build-volume-{}", basename))
}
