//! WebSocket log streaming.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::handlers::JobsState;
use crate::job::Job;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Streams job log lines as they arrive. When the job reaches a terminal
/// state and the buffer is drained, a close frame carries the status as its
/// reason.
pub async fn stream_job_logs(
    State(state): State<Arc<JobsState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(job) = state.jobs.get(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    ws.on_upgrade(move |socket| handle_log_stream(socket, job))
        .into_response()
}

async fn handle_log_stream(mut socket: WebSocket, job: Arc<Job>) {
    debug!("log stream opened for job {}", job.id);
    let mut offset = 0;
    let mut ticker = tokio::time::interval(POLL_INTERVAL);

    loop {
        ticker.tick().await;

        for line in job.logs_since(offset) {
            if socket.send(Message::Text(line.into())).await.is_err() {
                debug!("log stream client gone for job {}", job.id);
                return;
            }
            offset += 1;
        }

        let status = job.status();
        if status.is_terminal() && offset >= job.log_len() {
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::NORMAL,
                    reason: status.to_string().into(),
                })))
                .await;
            debug!("log stream closed for job {} ({status})", job.id);
            return;
        }
    }
}
