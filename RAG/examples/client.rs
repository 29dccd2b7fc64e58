use reqwest::Client;
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::new();
    let base_url = std::env::var("DOCQA_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());

    println!("Testing document QA service at {}", base_url);

    println!("\nHealth Check:");
    let health_response = client.get(format!("{}/health", base_url)).send().await?;
    println!("Status: {}", health_response.status());
    let health_json: serde_json::Value = health_response.json().await?;
    println!("Response: {}", serde_json::to_string_pretty(&health_json)?);

    println!("\nSystem Status:");
    let status_response = client.get(format!("{}/status", base_url)).send().await?;
    let status_json: serde_json::Value = status_response.json().await?;
    println!("Response: {}", serde_json::to_string_pretty(&status_json)?);

    let question = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let question = if question.is_empty() {
        "What is this document about?".to_string()
    } else {
        question
    };

    println!("\nQuery: {}", question);
    let query_response = client
        .post(format!("{}/query", base_url))
        .json(&json!({ "question": question }))
        .send()
        .await?;

    println!("Status: {}", query_response.status());
    let query_json: serde_json::Value = query_response.json().await?;
    println!("Response: {}", serde_json::to_string_pretty(&query_json)?);

    Ok(())
}
