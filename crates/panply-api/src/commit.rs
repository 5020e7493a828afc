// Commit and job endpoints
//
// A commit enqueues a job on the device; its terminal state is read back
// with `show jobs id N`. Both go through the XML API.

use tracing::debug;

use crate::client::DeviceClient;
use crate::error::Error;
use crate::models::{JobStatus, RawJob, flatten_text};

const COMMIT_CMD: &str = "<commit></commit>";

/// Result of enqueuing a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitRequest {
    /// The device accepted the commit as job `id`.
    Enqueued { id: u64 },
    /// The candidate equals the running configuration.
    NoChanges { message: String },
}

impl DeviceClient {
    /// Enqueue a commit of the whole candidate configuration.
    ///
    /// `GET /api/?type=commit&cmd=<commit></commit>`. Sent once: a retried
    /// commit whose first response was lost would enqueue a second job.
    pub async fn commit(&self) -> Result<CommitRequest, Error> {
        let url = self.xml_api_url(&[("type", "commit"), ("cmd", COMMIT_CMD)])?;
        debug!("enqueuing commit");

        let resp = self.send_once(true, |http| http.get(url.clone())).await?;
        let response = self.parse_xml_api(resp).await?;

        let job = response.result.as_ref().and_then(|r| r.get("job"));
        if let Some(job) = job {
            let id = flatten_text(job)
                .first()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| Error::Deserialization {
                    message: format!("commit job id is not numeric: {job}"),
                    body: job.to_string(),
                })?;
            debug!(job_id = id, "commit enqueued");
            return Ok(CommitRequest::Enqueued { id });
        }

        let message = response.message();
        if message.to_ascii_lowercase().contains("no changes") {
            debug!("nothing to commit");
            return Ok(CommitRequest::NoChanges { message });
        }

        Err(Error::Deserialization {
            message: format!("commit response carried neither a job id nor a message: {message}"),
            body: String::new(),
        })
    }

    /// Read the status of a device job.
    ///
    /// `GET /api/?type=op&cmd=<show><jobs><id>N</id></jobs></show>`
    pub async fn job_status(&self, id: u64) -> Result<JobStatus, Error> {
        let cmd = format!("<show><jobs><id>{id}</id></jobs></show>");
        let url = self.xml_api_url(&[("type", "op"), ("cmd", cmd.as_str())])?;
        debug!(job_id = id, "polling job");

        let resp = self.send(true, |http| http.get(url.clone())).await?;
        let response = self.parse_xml_api(resp).await?;

        let job = response
            .result
            .and_then(|mut r| r.get_mut("job").map(serde_json::Value::take))
            .ok_or_else(|| Error::Deserialization {
                message: format!("job {id} missing from op response"),
                body: String::new(),
            })?;

        let raw: RawJob = serde_json::from_value(job.clone()).map_err(|e| Error::Deserialization {
            message: format!("invalid job {id}: {e}"),
            body: job.to_string(),
        })?;
        Ok(raw.into())
    }
}
