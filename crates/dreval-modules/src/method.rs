//! OpenAI-compatible chat-completions method.

use anyhow::Context;
use async_trait::async_trait;
use dreval_core::Inference;
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Deserialize)]
pub struct OpenAiArgs {
    pub api_key: String,
    pub base_url: String,
    /// Extra body parameters merged into each request (`model`,
    /// `max_tokens`, ...).
    #[serde(default)]
    pub model_args: Map<String, Value>,
}

/// Calls a `/chat/completions` endpoint once per input, in input order.
/// Each input carries a `question` field; each output is `{"answer": ...}`.
pub struct OpenAiCompatible {
    api_key: String,
    base_url: String,
    model_args: Map<String, Value>,
    client: reqwest::Client,
}

impl OpenAiCompatible {
    pub fn new(args: OpenAiArgs) -> Self {
        Self {
            api_key: args.api_key,
            base_url: args.base_url.trim_end_matches('/').to_string(),
            model_args: args.model_args,
            client: reqwest::Client::new(),
        }
    }

    async fn complete(&self, question: &str) -> anyhow::Result<Value> {
        let mut body = Map::new();
        body.insert(
            "messages".into(),
            json!([
                {"role": "system", "content": ""},
                {"role": "user", "content": question},
            ]),
        );
        for (key, value) in &self.model_args {
            body.insert(key.clone(), value.clone());
        }

        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!("requesting completion from {url}");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&Value::Object(body))
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("request to {url} was rejected"))?;
        let payload: Value = response
            .json()
            .await
            .context("completion response was not valid JSON")?;
        let answer = payload["choices"][0]["message"]["content"]
            .as_str()
            .context("completion response missing choices[0].message.content")?;
        Ok(json!({"answer": answer}))
    }
}

#[async_trait]
impl Inference for OpenAiCompatible {
    async fn infer(&self, inputs: Vec<Value>) -> anyhow::Result<Vec<Value>> {
        let mut outputs = Vec::with_capacity(inputs.len());
        for input in inputs {
            let question = input["question"]
                .as_str()
                .context("input missing `question` field")?;
            outputs.push(self.complete(question).await?);
        }
        Ok(outputs)
    }
}
