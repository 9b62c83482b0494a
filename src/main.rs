use std::env;
use std::error::Error;
use std::fmt::Display;
use std::fs;
use std::path::PathBuf;
use std::process;
use structopt::StructOpt;

use config::Config;

mod config;
mod docker;
mod lambda;
mod logs;
mod util;

/// Packages the comic collection function and deploys it to AWS Lambda
#[derive(StructOpt, Debug)]
pub(crate) struct Opt {
    /// AWS Profile
    #[structopt(long)]
    profile: Option<String>,
    /// AWS Access Key
    #[structopt(long)]
    access_key: Option<String>,
    /// AWS Secret Key
    #[structopt(long)]
    secret_key: Option<String>,
    /// Full ARN of the function to deploy or its configuration key in table [arns] in Lambda.toml
    /// (e.g. arn:aws:lambda:eu-north-1:1234:function:ComicsLambda-prod).
    /// Defaults to ComicsLambda-<environment>
    #[structopt(name = "FUNCTION")]
    arn: Option<String>,
    /// Deployment environment, part of the function, bucket and table names
    #[structopt(long, env = "ENVIRONMENT", default_value = "dev")]
    environment: String,
    /// Region of ComicsLambda-<environment> when FUNCTION is not given
    #[structopt(long, env = "AWS_REGION")]
    region: Option<String>,
    /// Project binary to deploy
    #[structopt(long, default_value = "comics-lambda")]
    bin: String,
    /// BUCKET_NAME passed to the function (default comic-collection-<environment>-bucket)
    #[structopt(long)]
    bucket_name: Option<String>,
    /// TABLE_NAME passed to the function (default ComicsTable-<environment>)
    #[structopt(long)]
    table_name: Option<String>,
    /// Configuration file holding the [arns] table
    #[structopt(long, default_value = "Lambda.toml", parse(from_os_str))]
    config: PathBuf,
    /// Retain debug info in executable (for backtraces etc.)
    #[structopt(long)]
    keep_debug_info: bool,
    /// Override docker image with your own
    #[structopt(long, default_value = "softprops/lambda-rust:latest")]
    docker_image: String,
    /// Dry-run (compile and deploy in dry-run mode)
    #[structopt(long)]
    dry_run: bool,
    /// Use managed persistent build volume (speeds things up on windows hosts)
    #[structopt(long)]
    use_build_volume: bool,
    /// Pass environment variables to the container (for eg. -e RUSTFLAGS=-Ztime-passes)
    #[structopt(short, long)]
    env: Vec<String>,
    /// Tail function's cloudwatch logs
    #[structopt(long)]
    tail_logs: bool,
    /// Print diagnostic output
    #[structopt(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let opt = Opt::from_args();

    let level = if opt.verbose { log::Level::Debug } else { log::Level::Warn };
    if let Err(e) = simple_logger::init_with_level(level) {
        eprintln!("Failed to init logger: {}", e);
    }

    if let Err(e) = run(opt).await {
        eprintln!("\n===== Deploy FAILED =====");
        eprintln!("{}", e);
        process::exit(1);
    }
}

async fn run(opt: Opt) -> Result<(), Box<dyn Error>> {
    docker::check()?;

    let project_dir = env::current_dir().map_err(|e| format!("Can't read cwd: {}", e))?;
    let volume = docker::build_volume(&opt, &project_dir)?;

    if let Some(volume) = &volume {
        docker::manage_build_volume(volume)?;
    }

    let region = opt.region.clone().or_else(|| env::var("AWS_DEFAULT_REGION").ok());
    let target = util::resolve_target(
        opt.arn.as_deref(),
        &opt.environment,
        region.as_deref(),
        || Config::load(&opt.config),
    )?;

    let zip_file = format!("{}.zip", opt.bin);
    let mut zip_path = project_dir.clone();
    zip_path.extend(&["target", "lambda", "release", zip_file.as_str()]);

    println!(
        "Preparing to deploy {} to {} {}",
        zip_path.display(),
        target.region,
        target.function_name
    );

    let cargo_home = env::var("CARGO_HOME").map_err(|_| "Missing CARGO_HOME")?;
    let mut cargo_registry = PathBuf::from(cargo_home);
    cargo_registry.push("registry");

    let args = docker::build_args(&project_dir, &cargo_registry, volume.as_deref(), &opt);
    println!("Running docker with args {}", args.join(" "));
    docker::build(&args)?;

    let zip_data = fs::read(&zip_path)
        .map(bytes::Bytes::from)
        .map_err(|e| format!("Can't open {}: {}", zip_path.display(), e))?;

    let client = lambda::create_client(&opt, &target.region)?;

    let vars = lambda::function_environment(
        &opt.environment,
        opt.bucket_name.as_deref(),
        opt.table_name.as_deref(),
    );
    if opt.dry_run {
        log::info!("Dry run, leaving environment of {} untouched", target.function_name);
    } else {
        lambda::update_environment(&client, &target.function_name, vars).await?;
    }

    let res = lambda::update_code(&client, &target.function_name, zip_data, opt.dry_run)
        .await
        .map_err(|e| code_update_failed(&target.function_name, !opt.dry_run, e.as_ref()))?;

    fn disp<D: Display>(x: Option<D>) -> String {
        x.map(|x| format!("{}", x)).unwrap_or_else(|| "N/A".to_owned())
    }
    println!("\n===== Deploy successful =====");
    println!("Environment:   {}", opt.environment);
    println!("Function:      {}", disp(res.function_name.as_ref()));
    println!("Handler        {}", disp(res.handler));
    println!("Version:       {}", disp(res.version));
    println!("SHA-256:       {}", disp(res.code_sha_256));
    println!("Last Modified: {}", disp(res.last_modified));
    println!("Runtime:       {}", disp(res.runtime));
    println!("Mem limit:     {} MB", disp(res.memory_size));
    println!("Time limit:    {} s", disp(res.timeout));
    println!("ARN:           {}", disp(res.function_arn));
    println!("Role:          {}", disp(res.role));

    if opt.tail_logs {
        println!("\n===== Tailing logs =====");
        let logs_client = logs::create_client(&opt, &target.region)?;
        let func_name = res.function_name.unwrap_or(target.function_name);
        logs::tail(&logs_client, &func_name)
            .await
            .map_err(|e| format!("Failed to tail logs:\n{}", e))?;
    }

    Ok(())
}

/// The environment update has already been applied by the time the code upload fails.
fn code_update_failed(function_name: &str, environment_changed: bool, e: &dyn Error) -> String {
    if environment_changed {
        format!(
            "Uploading code to {} failed: {}\nBUCKET_NAME and TABLE_NAME were already updated, the function still runs its previous code",
            function_name, e
        )
    } else {
        format!("Uploading code to {} failed: {}", function_name, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Opt {
        Opt::from_iter_safe(std::iter::once("comics-deploy").chain(args.iter().cloned())).unwrap()
    }

    #[test]
    fn defaults() {
        let opt = parse(&["--environment", "dev"]);
        assert_eq!(opt.arn, None);
        assert_eq!(opt.bin, "comics-lambda");
        assert_eq!(opt.config, PathBuf::from("Lambda.toml"));
        assert!(!opt.dry_run && !opt.tail_logs);
    }

    #[test]
    fn function_key_and_flags() {
        let opt = parse(&["prod", "--environment", "prod", "--dry-run", "-e", "A=1", "-e", "B=2"]);
        assert_eq!(opt.arn.as_deref(), Some("prod"));
        assert_eq!(opt.environment, "prod");
        assert!(opt.dry_run);
        assert_eq!(opt.env, vec!["A=1", "B=2"]);
    }

    #[test]
    fn failed_upload_mentions_applied_environment() {
        let e: Box<dyn Error> = "ResourceConflictException".into();
        let msg = code_update_failed("ComicsLambda-dev", true, e.as_ref());
        assert!(msg.starts_with("Uploading code to ComicsLambda-dev failed: ResourceConflictException"));
        assert!(msg.contains("were already updated"));

        let dry = code_update_failed("ComicsLambda-dev", false, e.as_ref());
        assert!(!dry.contains("already updated"));
    }
}
