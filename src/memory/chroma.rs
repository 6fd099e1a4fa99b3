//! ChromaDB backend over the REST v1 API
//!
//! Embeddings are computed client-side with the hashing embedder; Chroma
//! only stores and ranks them. Metadata values must be scalars, so nested
//! values are sent as JSON strings.

use crate::errors::{AlfredError, Result};
use crate::memory::embedding::embed;
use crate::memory::store::MemoryStore;
use crate::memory::types::{MemoryRecord, Metadata};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    ids: Vec<String>,
    #[serde(default)]
    documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Option<Vec<Option<Metadata>>>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Metadata>>>>,
}

pub struct ChromaStore {
    http: Client,
    base_url: String,
    collection: String,
    collection_id: RwLock<String>,
}

impl ChromaStore {
    /// Connect and get-or-create the collection
    pub async fn connect(base_url: &str, collection: &str, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let id = create_collection(&http, &base_url, collection).await?;
        info!(url = %base_url, collection, "Connected to ChromaDB");

        Ok(Self {
            http,
            base_url,
            collection: collection.to_string(),
            collection_id: RwLock::new(id),
        })
    }

    async fn endpoint(&self, action: &str) -> String {
        let id = self.collection_id.read().await;
        format!("{}/api/v1/collections/{}/{}", self.base_url, id, action)
    }

    async fn post(&self, action: &str, body: Value) -> Result<reqwest::Response> {
        let url = self.endpoint(action).await;
        debug!(url = %url, "ChromaDB request");
        let response = self.http.post(&url).json(&body).send().await?;
        check(response).await
    }
}

async fn create_collection(http: &Client, base_url: &str, name: &str) -> Result<String> {
    let response = http
        .post(format!("{}/api/v1/collections", base_url))
        .json(&json!({
            "name": name,
            "metadata": { "description": "Alfred's persistent memory store" },
            "get_or_create": true,
        }))
        .send()
        .await
        .map_err(|e| AlfredError::Memory(format!("cannot reach ChromaDB at {}: {}", base_url, e)))?;
    let collection: CollectionResponse = check(response).await?.json().await?;
    Ok(collection.id)
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AlfredError::Memory(format!("ChromaDB error {}: {}", status, body.trim())))
}

/// Flatten non-scalar values to JSON strings
pub fn scalar_metadata(metadata: &Metadata) -> Metadata {
    metadata
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let value = match v {
                Value::Array(_) | Value::Object(_) => Value::String(v.to_string()),
                other => other.clone(),
            };
            (k.clone(), value)
        })
        .collect()
}

fn zip_records(
    ids: Vec<String>,
    documents: Option<Vec<Option<String>>>,
    metadatas: Option<Vec<Option<Metadata>>>,
) -> Vec<MemoryRecord> {
    let documents = documents.unwrap_or_default();
    let metadatas = metadatas.unwrap_or_default();
    ids.into_iter()
        .enumerate()
        .map(|(i, id)| MemoryRecord {
            id,
            document: documents.get(i).cloned().flatten().unwrap_or_default(),
            metadata: metadatas.get(i).cloned().flatten().unwrap_or_default(),
        })
        .collect()
}

#[async_trait]
impl MemoryStore for ChromaStore {
    fn backend(&self) -> &str {
        "chromadb"
    }

    async fn add(&self, record: MemoryRecord) -> Result<()> {
        self.post(
            "add",
            json!({
                "ids": [record.id],
                "embeddings": [embed(&record.document)],
                "documents": [record.document],
                "metadatas": [scalar_metadata(&record.metadata)],
            }),
        )
        .await?;
        Ok(())
    }

    async fn query(&self, text: &str, limit: usize) -> Result<Vec<MemoryRecord>> {
        let response: QueryResponse = self
            .post(
                "query",
                json!({
                    "query_embeddings": [embed(text)],
                    "n_results": limit,
                    "include": ["documents", "metadatas"],
                }),
            )
            .await?
            .json()
            .await?;

        let ids = response.ids.into_iter().next().unwrap_or_default();
        let documents = response.documents.and_then(|d| d.into_iter().next());
        let metadatas = response.metadatas.and_then(|m| m.into_iter().next());
        Ok(zip_records(ids, documents, metadatas))
    }

    async fn all(&self) -> Result<Vec<MemoryRecord>> {
        let response: GetResponse = self
            .post("get", json!({ "include": ["documents", "metadatas"] }))
            .await?
            .json()
            .await?;
        Ok(zip_records(response.ids, response.documents, response.metadatas))
    }

    async fn count(&self) -> Result<usize> {
        let url = self.endpoint("count").await;
        let response = check(self.http.get(&url).send().await?).await?;
        Ok(response.json::<usize>().await?)
    }

    async fn clear(&self) -> Result<()> {
        let url = format!("{}/api/v1/collections/{}", self.base_url, self.collection);
        check(self.http.delete(&url).send().await?).await?;

        let id = create_collection(&self.http, &self.base_url, &self.collection).await?;
        *self.collection_id.write().await = id;
        info!(collection = %self.collection, "ChromaDB collection recreated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::embedding::EMBEDDING_DIM;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    type Requests = Arc<Mutex<Vec<(String, String, Value)>>>;

    async fn read_request(stream: &mut TcpStream) -> (String, String, Value) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let mut lines = head.lines();
        let mut request_line = lines.next().unwrap().split_whitespace();
        let method = request_line.next().unwrap().to_string();
        let path = request_line.next().unwrap().to_string();
        let length = lines
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .map(|(_, value)| value.trim().parse::<usize>().unwrap())
            .unwrap_or(0);

        while buf.len() < header_end + length {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before body");
            buf.extend_from_slice(&chunk[..n]);
        }
        let body = if length == 0 {
            Value::Null
        } else {
            serde_json::from_slice(&buf[header_end..header_end + length]).unwrap()
        };
        (method, path, body)
    }

    fn route(method: &str, path: &str, created: &mut usize) -> (&'static str, Value) {
        match method {
            "POST" if path == "/api/v1/collections" => {
                *created += 1;
                ("200 OK", json!({ "id": format!("c{}", created) }))
            }
            "POST" if path.ends_with("/add") => ("201 Created", json!(true)),
            "POST" if path.ends_with("/query") => (
                "200 OK",
                json!({
                    "ids": [["m1"]],
                    "documents": [["Fact: the sky is blue"]],
                    "metadatas": [[{ "type": "fact" }]],
                    "distances": [[0.1]],
                }),
            ),
            "POST" if path.ends_with("/get") => (
                "200 OK",
                json!({
                    "ids": ["m1", "m2"],
                    "documents": ["one", "two"],
                    "metadatas": [{ "type": "fact" }, null],
                }),
            ),
            "GET" if path.ends_with("/count") => ("200 OK", json!(2)),
            "DELETE" => ("200 OK", json!({})),
            _ => ("404 Not Found", json!({ "error": "no route" })),
        }
    }

    /// Minimal Chroma REST server recording every request
    async fn spawn_chroma() -> (String, Requests) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests: Requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        tokio::spawn(async move {
            let mut created = 0;
            while let Ok((mut stream, _)) = listener.accept().await {
                let (method, path, body) = read_request(&mut stream).await;
                let (status, reply) = route(&method, &path, &mut created);
                seen.lock().unwrap().push((method, path, body));

                let payload = reply.to_string();
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    payload.len(),
                    payload
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                let _ = stream.shutdown().await;
            }
        });

        (format!("http://{}", addr), requests)
    }

    #[tokio::test]
    async fn test_rest_round_trip() {
        let (url, requests) = spawn_chroma().await;
        let store = ChromaStore::connect(&format!("{}/", url), "alfred_memory", 5)
            .await
            .unwrap();

        let mut metadata = Metadata::new();
        metadata.insert("type".into(), json!("fact"));
        metadata.insert("tags".into(), json!(["sky"]));
        let record = MemoryRecord::new("Fact: the sky is blue", metadata);
        let record_id = record.id.clone();
        store.add(record).await.unwrap();

        let hits = store.query("sky colour", 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "m1");
        assert_eq!(hits[0].document, "Fact: the sky is blue");
        assert_eq!(hits[0].kind(), Some("fact"));

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].document, "two");
        assert!(all[1].metadata.is_empty());

        assert_eq!(store.count().await.unwrap(), 2);

        store.clear().await.unwrap();
        store
            .add(MemoryRecord::new("after clear", Metadata::new()))
            .await
            .unwrap();

        let requests = requests.lock().unwrap().clone();
        let calls: Vec<(&str, &str)> = requests
            .iter()
            .map(|(method, path, _)| (method.as_str(), path.as_str()))
            .collect();
        assert_eq!(
            calls,
            vec![
                ("POST", "/api/v1/collections"),
                ("POST", "/api/v1/collections/c1/add"),
                ("POST", "/api/v1/collections/c1/query"),
                ("POST", "/api/v1/collections/c1/get"),
                ("GET", "/api/v1/collections/c1/count"),
                ("DELETE", "/api/v1/collections/alfred_memory"),
                ("POST", "/api/v1/collections"),
                ("POST", "/api/v1/collections/c2/add"),
            ]
        );

        let create = &requests[0].2;
        assert_eq!(create["name"], "alfred_memory");
        assert_eq!(create["get_or_create"], true);

        let add = &requests[1].2;
        assert_eq!(add["ids"][0], record_id.as_str());
        assert_eq!(add["documents"][0], "Fact: the sky is blue");
        assert_eq!(add["metadatas"][0]["tags"], r#"["sky"]"#);
        assert_eq!(add["embeddings"][0].as_array().unwrap().len(), EMBEDDING_DIM);

        let query = &requests[2].2;
        assert_eq!(query["n_results"], 3);
        assert_eq!(
            query["query_embeddings"][0].as_array().unwrap().len(),
            EMBEDDING_DIM
        );
        assert_eq!(query["include"], json!(["documents", "metadatas"]));
        assert_eq!(requests[4].2, Value::Null);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_memory_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        match ChromaStore::connect(&format!("http://{}", addr), "alfred_memory", 2).await {
            Err(AlfredError::Memory(msg)) => assert!(msg.contains("cannot reach ChromaDB")),
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("connected to a closed port"),
        }
    }

    #[test]
    fn test_scalar_metadata() {
        let mut metadata = Metadata::new();
        metadata.insert("type".into(), json!("fact"));
        metadata.insert("count".into(), json!(3));
        metadata.insert("tags".into(), json!(["a", "b"]));
        metadata.insert("gone".into(), Value::Null);

        let flat = scalar_metadata(&metadata);
        assert_eq!(flat["type"], "fact");
        assert_eq!(flat["count"], 3);
        assert_eq!(flat["tags"], r#"["a","b"]"#);
        assert!(!flat.contains_key("gone"));
    }

    #[test]
    fn test_parse_query_response() {
        let raw = r#"{"ids":[["a","b"]],"documents":[["doc a",null]],
                      "metadatas":[[{"type":"fact"},null]],"distances":[[0.1,0.2]]}"#;
        let response: QueryResponse = serde_json::from_str(raw).unwrap();
        let ids = response.ids.into_iter().next().unwrap();
        let docs = response.documents.and_then(|d| d.into_iter().next());
        let metas = response.metadatas.and_then(|m| m.into_iter().next());
        let records = zip_records(ids, docs, metas);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].document, "doc a");
        assert_eq!(records[0].kind(), Some("fact"));
        assert_eq!(records[1].document, "");
    }
}
