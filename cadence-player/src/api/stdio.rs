//! JSON-lines host driver
//!
//! Reads one request object per input line and writes one JSON object per
//! output line: replies as `{"id", "result"}` or `{"id", "error"}`, events
//! as `{"event": ...}`. Results that settle later (load, play, seek) are
//! awaited off the read loop so a pending `play` never blocks the `pause`
//! that resolves it. End of input disposes the player; the driver returns
//! once the event stream has ended and every reply is written.

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use super::requests::HostRequest;
use crate::error::{PlayerError, Result};
use crate::playback::{CommandResponse, EventStream, PlayerCommand, PlayerHandle};

/// Serialize a command outcome as a reply line
pub fn reply_json(id: Option<Value>, result: &Result<CommandResponse>) -> Value {
    let mut reply = match result {
        Ok(response) => json!({ "result": response }),
        Err(e) => json!({
            "error": {
                "code": e.code(),
                "message": e.to_string(),
                "details": e.details(),
            }
        }),
    };
    if let Some(id) = id {
        reply["id"] = id;
    }
    reply
}

fn decode(line: &str) -> (Option<Value>, Result<PlayerCommand>) {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => return (None, Err(PlayerError::from(e))),
    };
    let id = value.get("id").cloned();
    let command = HostRequest::from_json(&value).and_then(HostRequest::into_command);
    (id, command)
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, value: &Value) -> std::io::Result<()> {
    let mut line = value.to_string();
    line.push('\n');
    output.write_all(line.as_bytes()).await?;
    output.flush().await
}

/// Drive `handle` from `input` until end of input and end of events
pub async fn serve<R, W>(handle: PlayerHandle, mut events: EventStream, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Value>();
    let mut reply_tx = Some(reply_tx);
    let mut events_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if reply_tx.is_some() => {
                let Some(tx) = reply_tx.as_ref() else { continue };
                match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => submit(&handle, tx, &line).await,
                    None => {
                        info!("Input closed, disposing player");
                        submit_command(&handle, tx, None, PlayerCommand::Dispose).await;
                        // Outstanding replies hold their own sender clones
                        reply_tx = None;
                    }
                }
            }
            event = events.next(), if events_open => match event {
                Some(event) => write_line(&mut output, &json!({ "event": event })).await?,
                None => {
                    debug!("Event stream ended");
                    events_open = false;
                }
            },
            reply = reply_rx.recv() => match reply {
                Some(reply) => write_line(&mut output, &reply).await?,
                None => {
                    if !events_open {
                        break;
                    }
                    // Replies are done; keep draining events until end of stream
                    while let Some(event) = events.next().await {
                        write_line(&mut output, &json!({ "event": event })).await?;
                    }
                    break;
                }
            },
        }
    }

    Ok(())
}

async fn submit(handle: &PlayerHandle, tx: &mpsc::UnboundedSender<Value>, line: &str) {
    let (id, command) = decode(line);
    match command {
        Ok(command) => submit_command(handle, tx, id, command).await,
        Err(e) => {
            warn!("Rejecting request: {}", e);
            let _ = tx.send(reply_json(id, &Err(e)));
        }
    }
}

async fn submit_command(
    handle: &PlayerHandle,
    tx: &mpsc::UnboundedSender<Value>,
    id: Option<Value>,
    command: PlayerCommand,
) {
    match handle.submit(command).await {
        Ok(rx) => {
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = rx.await.unwrap_or(Err(PlayerError::Disposed));
                let _ = tx.send(reply_json(id, &result));
            });
        }
        Err(e) => {
            let _ = tx.send(reply_json(id, &Err(e)));
        }
    }
}
