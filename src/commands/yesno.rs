//! `/yesno`: answer a question with a yes/no image.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use super::handler::{CommandError, CommandHandler, ServiceError};
use crate::message::{Message, Payload};

pub const TOKEN: &str = "/yesno";
pub const DESCRIPTION: &str = "Ask a question which i can answer with just \"yes\" or \"no\" ?";

pub const DEFAULT_ENDPOINT: &str = "https://yesno.wtf/api";

const SERVICE_ALERT: &str =
    "There seems to be a problem communicating with this service, can you try again later.";
const EMPTY_QUESTION_ALERT: &str = "Ask me something first, e.g. /yesno will it rain today?";

/// Oracle response.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct YesNoAnswer {
    pub answer: String,
    #[serde(default)]
    pub forced: bool,
    pub image: String,
}

/// Back-end answering yes/no questions.
#[async_trait]
pub trait YesNoOracle: Send + Sync {
    async fn ask(&self, question: &str) -> Result<YesNoAnswer, ServiceError>;
}

/// Oracle reached over HTTP: `GET {endpoint}?question=...`.
pub struct HttpYesNoOracle {
    client: Client,
    endpoint: String,
}

impl HttpYesNoOracle {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl YesNoOracle for HttpYesNoOracle {
    async fn ask(&self, question: &str) -> Result<YesNoAnswer, ServiceError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("question", question)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status(status.as_u16()));
        }

        response
            .json::<YesNoAnswer>()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))
    }
}

/// Append a question mark when the question does not end with one.
pub fn normalize_question(text: &str) -> String {
    let question = text.trim();
    if question.ends_with('?') {
        question.to_string()
    } else {
        format!("{} ?", question)
    }
}

pub struct YesNoHandler {
    oracle: Arc<dyn YesNoOracle>,
}

impl YesNoHandler {
    pub fn new(oracle: Arc<dyn YesNoOracle>) -> Self {
        Self { oracle }
    }
}

#[async_trait]
impl CommandHandler for YesNoHandler {
    async fn execute(&self, args: &str) -> Result<Message, CommandError> {
        if args.trim().is_empty() {
            return Err(CommandError::usage(EMPTY_QUESTION_ALERT));
        }

        let question = normalize_question(args);
        let answer = self
            .oracle
            .ask(&question)
            .await
            .map_err(|e| CommandError::service(SERVICE_ALERT, e))?;

        tracing::debug!("Oracle answered '{}' to '{}'", answer.answer, question);
        Ok(Message::command_result(
            TOKEN,
            answer.answer.clone(),
            Payload::YesNo {
                answer: answer.answer,
                image: answer.image,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageKind, StoredMessage, ViewDetail};
    use crate::message::MessageId;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_normalize_question() {
        assert_eq!(normalize_question("is it friday"), "is it friday ?");
        assert_eq!(normalize_question("is it friday?"), "is it friday?");
        assert_eq!(normalize_question("  why? really "), "why? really ?");
    }

    #[tokio::test]
    async fn test_http_oracle_sends_question() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("question", "will it rain ?"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "answer": "no",
                "forced": false,
                "image": "https://yesno.wtf/assets/no/1.gif"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let handler = YesNoHandler::new(Arc::new(HttpYesNoOracle::with_endpoint(server.uri())));
        let message = handler.execute("will it rain").await.unwrap();

        assert_eq!(message.kind(), MessageKind::CommandResult);
        assert_eq!(message.command(), Some(TOKEN));
        assert_eq!(message.body, "no");
        assert_eq!(
            message.payload(),
            Some(&Payload::YesNo {
                answer: "no".to_string(),
                image: "https://yesno.wtf/assets/no/1.gif".to_string(),
            })
        );

        let view = handler.present(&StoredMessage::new(MessageId::new("k"), message));
        assert_eq!(view.text, "No");
        assert_eq!(view.detail, ViewDetail::Image("https://yesno.wtf/assets/no/1.gif".to_string()));
    }

    #[tokio::test]
    async fn test_http_failure_becomes_service_alert() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let handler = YesNoHandler::new(Arc::new(HttpYesNoOracle::with_endpoint(server.uri())));
        let err = handler.execute("is it on?").await.unwrap_err();

        assert!(matches!(err, CommandError::Service { source: ServiceError::Status(503), .. }));
        assert_eq!(err.alert(), SERVICE_ALERT);
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let oracle = HttpYesNoOracle::with_endpoint(server.uri());
        assert!(matches!(oracle.ask("x ?").await, Err(ServiceError::Parse(_))));
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected_locally() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let handler = YesNoHandler::new(Arc::new(HttpYesNoOracle::with_endpoint(server.uri())));
        let err = handler.execute("   ").await.unwrap_err();
        assert!(matches!(err, CommandError::Usage(_)));
    }
}
