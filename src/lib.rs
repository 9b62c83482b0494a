use lambda_runtime::{Context, Error, LambdaEvent};
use serde::Serialize;
use serde_json::Value;

pub const BODY: &str = concat!(
    "Date - 8/15/2024",
    "Say Hello to My Comic Collection! ",
    "This app allows you to catalog and manage your comic book collection with ease. ",
    "You can add new comics to your collection, view detailed information about each comic, ",
    "and track your collection over time. Whether you are an avid collector or just starting, ",
    "this app provides a convenient way to keep your collection organized and accessible."
);

/// API Gateway proxy integration response.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status_code: u16,
    pub body: String,
}

impl Response {
    pub fn comic_collection() -> Self {
        Response {
            status_code: 200,
            body: BODY.to_owned(),
        }
    }
}

/// Neither the event nor the context is inspected; every invocation gets the same answer.
pub fn handle(_event: &Value, _context: &Context) -> Response {
    Response::comic_collection()
}

pub async fn handler(event: LambdaEvent<Value>) -> Result<Response, Error> {
    let (payload, context) = event.into_parts();
    log::debug!("Invocation {}", context.request_id);
    Ok(handle(&payload, &context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invoke(payload: Value) -> Response {
        handle(&payload, &Context::default())
    }

    #[test]
    fn empty_event_gets_collection_page() {
        let res = invoke(json!({}));
        assert_eq!(res.status_code, 200);
        assert_eq!(res.body, BODY);
    }

    #[test]
    fn null_event_gets_collection_page() {
        assert_eq!(invoke(Value::Null), Response::comic_collection());
    }

    #[test]
    fn payload_is_never_echoed() {
        let res = invoke(json!({ "malicious": "<script>" }));
        assert_eq!(res, Response::comic_collection());
        assert!(!res.body.contains("<script>"));
    }

    #[test]
    fn repeated_invocations_agree() {
        let first = invoke(json!({ "httpMethod": "GET", "path": "/" }));
        let second = invoke(json!([1, 2, 3]));
        assert_eq!(first, second);
    }

    #[test]
    fn body_text() {
        assert_eq!(
            BODY,
            "Date - 8/15/2024Say Hello to My Comic Collection! This app allows you to catalog and \
             manage your comic book collection with ease. You can add new comics to your \
             collection, view detailed information about each comic, and track your collection \
             over time. Whether you are an avid collector or just starting, this app provides a \
             convenient way to keep your collection organized and accessible."
        );
    }

    #[test]
    fn serializes_to_proxy_shape() {
        let value = serde_json::to_value(Response::comic_collection()).unwrap();
        assert_eq!(value, json!({ "statusCode": 200, "body": BODY }));
    }

    #[tokio::test]
    async fn runtime_handler_never_fails() {
        let event = LambdaEvent::new(Value::Null, Context::default());
        let res = handler(event).await.unwrap();
        assert_eq!(res, Response::comic_collection());
    }
}
