//! `blade call <method>`: one `blade.execute` round trip.
//!
//! Connects, authenticates, executes the method against the negotiated
//! protocol, and prints the unwrapped result as JSON.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::debug;

use blade_client::{Reply, SessionOptions};
use blade_core::messages::blade_execute;

/// Parse `--params`; absent means an empty object.
pub fn parse_params(raw: Option<&str>) -> Result<Value> {
    let Some(raw) = raw else {
        return Ok(Value::Object(Default::default()));
    };
    let params: Value = serde_json::from_str(raw).context("--params is not valid JSON")?;
    if !params.is_object() {
        bail!("--params must be a JSON object");
    }
    Ok(params)
}

pub async fn run(options: SessionOptions, method: &str, params: Option<&str>) -> Result<()> {
    let params = parse_params(params)?;
    let (session, status) = super::open(options).await?;

    let request = blade_execute(&status.protocol, method, params);
    debug!(id = %request.id, method, "executing");
    let reply = session.execute(request).await;
    session.disconnect()?;

    match reply? {
        Reply::Result(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Reply::TimedOut => bail!("{method}: no reply within the request timeout"),
        Reply::Sent => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_params_is_empty_object() {
        assert_eq!(parse_params(None).unwrap(), json!({}));
    }

    #[test]
    fn params_object_is_accepted() {
        let params = parse_params(Some(r#"{"to": "+15550100"}"#)).unwrap();
        assert_eq!(params["to"], "+15550100");
    }

    #[test]
    fn params_must_be_an_object() {
        assert!(parse_params(Some("[1, 2]")).is_err());
        assert!(parse_params(Some("{oops")).is_err());
    }
}
