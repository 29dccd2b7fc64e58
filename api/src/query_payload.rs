use serde::Deserialize;

#[derive(Deserialize)]
pub struct QueryPayload {
    #[serde(alias = "text")]
    pub question: String,
}
