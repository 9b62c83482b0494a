use rusoto_core::credential::{DefaultCredentialsProvider, ProfileProvider, StaticProvider};
use rusoto_core::{HttpClient, Region};
use rusoto_lambda::{
    Environment, EnvironmentResponse, FunctionConfiguration, GetFunctionConfigurationRequest, Lambda, LambdaClient,
    UpdateFunctionCodeRequest, UpdateFunctionConfigurationRequest,
};
use std::collections::HashMap;
use std::error::Error;
use std::str::FromStr;
use std::time::Duration;

use crate::Opt;

const UPDATE_POLL_ATTEMPTS: u32 = 60;

pub(crate) fn create_client(opt: &Opt, region: &str) -> Result<LambdaClient, Box<dyn Error>> {
    let dispatcher = HttpClient::new()?;
    let region = Region::from_str(region)?;

    let client = match (&opt.access_key, &opt.secret_key, &opt.profile) {
        (Some(access_key), Some(secret_key), _) => {
            let creds = StaticProvider::new_minimal(access_key.to_owned(), secret_key.to_owned());
            LambdaClient::new_with(dispatcher, creds, region)
        }
        (_, _, Some(profile)) => {
            let mut creds = ProfileProvider::new()?;
            creds.set_profile(profile.as_str());
            LambdaClient::new_with(dispatcher, creds, region)
        }
        _ => LambdaClient::new_with(dispatcher, DefaultCredentialsProvider::new()?, region),
    };
    Ok(client)
}

/// `BUCKET_NAME` and `TABLE_NAME` the function expects for `environment`.
pub fn function_environment(
    environment: &str,
    bucket_name: Option<&str>,
    table_name: Option<&str>,
) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert(
        "BUCKET_NAME".to_owned(),
        bucket_name
            .map(str::to_owned)
            .unwrap_or_else(|| format!("comic-collection-{}-bucket", environment)),
    );
    vars.insert(
        "TABLE_NAME".to_owned(),
        table_name
            .map(str::to_owned)
            .unwrap_or_else(|| format!("ComicsTable-{}", environment)),
    );
    vars
}

/// Overlays `vars` on the variables the function already has.
pub fn merged_variables(
    current: Option<EnvironmentResponse>,
    vars: HashMap<String, String>,
) -> HashMap<String, String> {
    let mut variables = current.and_then(|env| env.variables).unwrap_or_default();
    variables.extend(vars);
    variables
}

pub async fn update_environment(
    client: &LambdaClient,
    function_name: &str,
    vars: HashMap<String, String>,
) -> Result<(), Box<dyn Error>> {
    let current = wait_for_update(client, function_name).await?;

    let req = UpdateFunctionConfigurationRequest {
        function_name: function_name.to_owned(),
        environment: Some(Environment {
            variables: Some(merged_variables(current.environment, vars)),
        }),
        ..Default::default()
    };
    client.update_function_configuration(req).await?;
    wait_for_update(client, function_name).await?;
    Ok(())
}

pub async fn update_code(
    client: &LambdaClient,
    function_name: &str,
    zip_data: bytes::Bytes,
    dry_run: bool,
) -> Result<FunctionConfiguration, Box<dyn Error>> {
    let req = UpdateFunctionCodeRequest {
        dry_run: Some(dry_run),
        function_name: function_name.to_owned(),
        publish: Some(!dry_run),
        zip_file: Some(zip_data),
        ..Default::default()
    };
    Ok(client.update_function_code(req).await?)
}

async fn get_configuration(
    client: &LambdaClient,
    function_name: &str,
) -> Result<FunctionConfiguration, Box<dyn Error>> {
    let req = GetFunctionConfigurationRequest {
        function_name: function_name.to_owned(),
        ..Default::default()
    };
    Ok(client.get_function_configuration(req).await?)
}

/// `Ok(true)` while the last update is still being applied.
pub fn update_state(config: &FunctionConfiguration) -> Result<bool, Box<dyn Error>> {
    match config.last_update_status.as_deref() {
        Some("InProgress") => Ok(true),
        Some("Failed") => Err(format!(
            "Updating {} failed: {}",
            config.function_name.as_deref().unwrap_or("function"),
            config.last_update_status_reason.as_deref().unwrap_or_default()
        )
        .into()),
        _ => Ok(false),
    }
}

/// Lambda rejects any update while another one is still in progress.
async fn wait_for_update(
    client: &LambdaClient,
    function_name: &str,
) -> Result<FunctionConfiguration, Box<dyn Error>> {
    for _ in 0..UPDATE_POLL_ATTEMPTS {
        let config = get_configuration(client, function_name).await?;
        if !update_state(&config)? {
            return Ok(config);
        }
        log::debug!("{} update in progress", function_name);
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    Err(format!("Timed out waiting for {} to finish updating", function_name).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_defaults_follow_stage() {
        let vars = function_environment("prod", None, None);
        assert_eq!(vars["BUCKET_NAME"], "comic-collection-prod-bucket");
        assert_eq!(vars["TABLE_NAME"], "ComicsTable-prod");
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn environment_overrides() {
        let vars = function_environment("dev", Some("my-comics"), None);
        assert_eq!(vars["BUCKET_NAME"], "my-comics");
        assert_eq!(vars["TABLE_NAME"], "ComicsTable-dev");
    }

    fn config(status: Option<&str>, reason: Option<&str>) -> FunctionConfiguration {
        FunctionConfiguration {
            function_name: Some("ComicsLambda-dev".to_owned()),
            last_update_status: status.map(str::to_owned),
            last_update_status_reason: reason.map(str::to_owned),
            ..Default::default()
        }
    }

    #[test]
    fn keeps_waiting_while_in_progress() {
        assert!(update_state(&config(Some("InProgress"), None)).unwrap());
    }

    #[test]
    fn settled_updates_stop_waiting() {
        assert!(!update_state(&config(Some("Successful"), None)).unwrap());
        assert!(!update_state(&config(None, None)).unwrap());
    }

    #[test]
    fn failed_update_reports_reason() {
        let err = update_state(&config(Some("Failed"), Some("Role not found"))).unwrap_err();
        assert_eq!(err.to_string(), "Updating ComicsLambda-dev failed: Role not found");
    }

    #[test]
    fn merge_keeps_other_variables() {
        let mut existing = HashMap::new();
        existing.insert("RUST_LOG".to_owned(), "debug".to_owned());
        existing.insert("BUCKET_NAME".to_owned(), "old-bucket".to_owned());
        let current = EnvironmentResponse {
            variables: Some(existing),
            ..Default::default()
        };

        let merged = merged_variables(Some(current), function_environment("dev", None, None));
        assert_eq!(merged["RUST_LOG"], "debug");
        assert_eq!(merged["BUCKET_NAME"], "comic-collection-dev-bucket");
        assert_eq!(merged["TABLE_NAME"], "ComicsTable-dev");
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn merge_without_environment() {
        let merged = merged_variables(None, function_environment("prod", None, None));
        assert_eq!(merged, function_environment("prod", None, None));
    }
}
