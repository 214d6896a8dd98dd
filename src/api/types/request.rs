#![allow(
    clippy::module_name_repetitions,
    reason = "Request suffix is intentional for clarity"
)]

use bon::Builder;
use serde::Serialize;

/// Query options for list endpoints. The page number is added by the manager.
#[derive(Debug, Clone, Builder, Default, Serialize)]
#[non_exhaustive]
pub struct ListRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
    /// Comma separated relationships to include, e.g. `allocations,egg`
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub include: Option<String>,
    #[serde(rename = "filter[name]", skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub filter_name: Option<String>,
}

/// Power signal accepted by a server, over REST and over the console socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[non_exhaustive]
pub enum PowerSignal {
    Start,
    Stop,
    Restart,
    Kill,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CommandRequest<'cmd> {
    pub command: &'cmd str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PowerRequest {
    pub signal: PowerSignal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToQueryParams as _;

    #[test]
    fn list_request_query() {
        let request = ListRequest::builder()
            .per_page(25)
            .filter_name("lobby")
            .build();

        assert_eq!(
            request.query_params(Some(3)),
            "?per_page=25&filter%5Bname%5D=lobby&page=3"
        );
    }

    #[test]
    fn power_signal_forms() {
        assert_eq!(PowerSignal::Restart.to_string(), "restart");
        assert_eq!(
            serde_json::to_string(&PowerRequest {
                signal: PowerSignal::Kill
            })
            .unwrap(),
            r#"{"signal":"kill"}"#
        );
    }
}
