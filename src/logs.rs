use rusoto_core::credential::{DefaultCredentialsProvider, ProfileProvider, StaticProvider};
use rusoto_core::{HttpClient, Region};
use rusoto_logs::{CloudWatchLogs, CloudWatchLogsClient, FilterLogEventsRequest, FilteredLogEvent};
use std::collections::HashMap;
use std::error::Error;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use crate::Opt;

const LOOKBACK_MILLIS: i64 = 5 * 60 * 1000;
const POLL_INTERVAL: Duration = Duration::from_millis(3000);

pub(crate) fn create_client(opt: &Opt, region: &str) -> Result<CloudWatchLogsClient, Box<dyn Error>> {
    let dispatcher = HttpClient::new()?;
    let region = Region::from_str(region)?;

    let client = match (&opt.access_key, &opt.secret_key, &opt.profile) {
        (Some(access_key), Some(secret_key), _) => {
            let creds = StaticProvider::new_minimal(access_key.to_owned(), secret_key.to_owned());
            CloudWatchLogsClient::new_with(dispatcher, creds, region)
        }
        (_, _, Some(profile)) => {
            let mut creds = ProfileProvider::new()?;
            creds.set_profile(profile.as_str());
            CloudWatchLogsClient::new_with(dispatcher, creds, region)
        }
        _ => CloudWatchLogsClient::new_with(dispatcher, DefaultCredentialsProvider::new()?, region),
    };
    Ok(client)
}

pub fn log_group_name(function_name: &str) -> String {
    format!("/aws/lambda/{}", function_name)
}

fn now_millis() -> Result<i64, Box<dyn Error>> {
    Ok(SystemTime::now().duration_since(SystemTime::UNIX_EPOCH)?.as_millis() as i64)
}

/// Events not printed yet that happened after `since`. Marks them as seen.
fn unseen_events(events: Vec<FilteredLogEvent>, since: i64, seen: &mut HashMap<String, i64>) -> Vec<String> {
    let mut messages = Vec::new();
    for event in events {
        let ts = event.timestamp.unwrap_or(i64::MAX);
        let id = match event.event_id {
            Some(id) => id,
            None => continue,
        };
        if ts > since && seen.insert(id, ts).is_none() {
            messages.push(event.message.unwrap_or_default());
        }
    }
    messages
}

/// The query never returns events older than the window start.
fn forget_before(seen: &mut HashMap<String, i64>, start_time: i64) {
    seen.retain(|_, ts| *ts >= start_time);
}

pub async fn tail(logs_client: &CloudWatchLogsClient, function_name: &str) -> Result<(), Box<dyn Error>> {
    let user_time = now_millis()?;
    let mut next_token = None;
    let mut start_time = Some(user_time - LOOKBACK_MILLIS);
    let mut seen = HashMap::new();

    loop {
        let input = FilterLogEventsRequest {
            limit: Some(10000),
            log_group_name: log_group_name(function_name),
            next_token: next_token.clone(),
            start_time,
            ..Default::default()
        };

        let res = logs_client.filter_log_events(input).await?;

        if let Some(events) = res.events {
            for message in unseen_events(events, user_time, &mut seen) {
                print!("{}", message);
            }
        }

        next_token = res.next_token;

        if next_token.is_none() {
            let window_start = now_millis()? - LOOKBACK_MILLIS;
            forget_before(&mut seen, window_start);
            start_time = Some(window_start);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
