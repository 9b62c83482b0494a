use std::error::Error;
use std::process::Command;

use crate::config::Config;

pub trait CommandExt {
    fn status_bool(&mut self) -> bool;
}

impl CommandExt for Command {
    fn status_bool(&mut self) -> bool {
        let result = self.status();
        result.map(|r| r.success()).unwrap_or(false)
    }
}

/// Region and function name of the Lambda function being deployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub region: String,
    pub function_name: String,
}

pub fn function_name(environment: &str) -> String {
    format!("ComicsLambda-{}", environment)
}

/// `arn:<partition>:lambda:<region>:<account>:function:<name>[:<qualifier>]`
pub fn parse_arn(arn: &str) -> Result<Target, Box<dyn Error>> {
    let parts = arn.split(':').collect::<Vec<_>>();
    match parts.as_slice() {
        ["arn", _partition, "lambda", region, _account, "function", name]
        | ["arn", _partition, "lambda", region, _account, "function", name, _]
            if !region.is_empty() && !name.is_empty() =>
        {
            Ok(Target {
                region: (*region).to_owned(),
                function_name: (*name).to_owned(),
            })
        }
        _ => Err(format!("Not a Lambda function ARN: {}", arn).into()),
    }
}

pub fn parse_arn_or_key(arn_or_key: &str, config: &Config) -> Result<Target, Box<dyn Error>> {
    if arn_or_key.starts_with("arn:") {
        return parse_arn(arn_or_key);
    }
    let arn = config
        .arns
        .get(arn_or_key)
        .ok_or_else(|| format!("No key {} in [arns] table", arn_or_key))?;
    parse_arn(arn)
}

/// Falls back to the environment's function when no ARN or key was given.
pub fn resolve_target(
    arn_or_key: Option<&str>,
    environment: &str,
    region: Option<&str>,
    config: impl FnOnce() -> Result<Config, Box<dyn Error>>,
) -> Result<Target, Box<dyn Error>> {
    match arn_or_key {
        Some(arn_or_key) if arn_or_key.starts_with("arn:") => parse_arn(arn_or_key),
        Some(key) => parse_arn_or_key(key, &config()?),
        None => {
            let region = region.ok_or("No function given, --region (or AWS_REGION) is required")?;
            Ok(Target {
                region: region.to_owned(),
                function_name: function_name(environment),
            })
        }
    }
}
