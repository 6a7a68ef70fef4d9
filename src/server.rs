use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use crate::error::StoreError;
use crate::ConfigStore;

// --- OpCodes ---
pub const OP_CREATE: u8 = 0x01;
pub const OP_READ: u8 = 0x02;
pub const OP_UPDATE: u8 = 0x03;
pub const OP_DELETE: u8 = 0x04;
pub const OP_DEPLOY: u8 = 0x05;
pub const OP_ROLLBACK: u8 = 0x06;
pub const OP_HISTORY: u8 = 0x07;

// --- Status bytes ---
pub const ST_OK: u8 = 0;
pub const ST_NOT_FOUND: u8 = 1;
pub const ST_ALREADY_EXISTS: u8 = 2;
pub const ST_INVALID_FORMAT: u8 = 3;
pub const ST_BAD_REQUEST: u8 = 4;

pub struct ConfigServer {
    store: Arc<ConfigStore>,
}

impl ConfigServer {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self { store }
    }

    pub async fn run(&self, addr: &str) {
        let listener = TcpListener::bind(addr).await.expect("Could not bind to port");
        info!("confdb listening on {}", addr);

        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let store = self.store.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(socket, store).await {
                            // Ignore expected disconnections to keep logs clean
                            if e.kind() != std::io::ErrorKind::UnexpectedEof {
                                error!("Client Error: {}", e);
                            }
                        }
                    });
                }
                Err(e) => error!("Connection failed: {}", e),
            }
        }
    }
}

async fn handle_client(mut stream: TcpStream, store: Arc<ConfigStore>) -> std::io::Result<()> {
    // 64KB buffer to prevent large-payload DoS
    let mut buffer = [0u8; 65536];

    loop {
        // 1. Read OpCode
        let mut op_buf = [0u8; 1];
        if stream.read_exact(&mut op_buf).await.is_err() {
            return Ok(());
        }
        let op_code = op_buf[0];

        // 2. Read Length
        let mut len_buf = [0u8; 4];
        if stream.read_exact(&mut len_buf).await.is_err() {
            return Ok(());
        }
        let length = u32::from_le_bytes(len_buf) as usize;

        // 3. Read Body
        if length > buffer.len() {
            warn!("Payload too large: {} bytes (Max 65536)", length);
            return Ok(());
        }
        stream.read_exact(&mut buffer[..length]).await?;
        let body = &buffer[..length];

        let mut writer = BufWriter::new(&mut stream);

        // 4. Process Command
        match op_code {
            OP_CREATE => handle_create(&mut writer, body, &store).await?,
            OP_READ => handle_read(&mut writer, body, &store).await?,
            OP_UPDATE => handle_update(&mut writer, body, &store).await?,
            OP_DELETE => handle_delete(&mut writer, body, &store).await?,
            OP_DEPLOY => handle_deploy(&mut writer, body, &store).await?,
            OP_ROLLBACK => handle_rollback(&mut writer, body, &store).await?,
            OP_HISTORY => handle_history(&mut writer, &store).await?,
            _ => {
                warn!("Unknown OpCode: 0x{:02X}", op_code);
                return Ok(());
            }
        }
        writer.flush().await?;
    }
}

// --- FRAME DECODING ---

fn decode_id(body: &[u8]) -> Option<&str> {
    let id = std::str::from_utf8(body).ok()?;
    if id.is_empty() {
        return None;
    }
    Some(id)
}

// Body layout: [id_len u16 LE][id][payload]
fn decode_id_payload(body: &[u8]) -> Option<(&str, &str)> {
    if body.len() < 2 {
        return None;
    }
    let id_len = u16::from_le_bytes([body[0], body[1]]) as usize;
    if body.len() < 2 + id_len {
        return None;
    }
    let id = std::str::from_utf8(&body[2..2 + id_len]).ok()?;
    let payload = std::str::from_utf8(&body[2 + id_len..]).ok()?;
    if id.is_empty() || payload.is_empty() {
        return None;
    }
    Some((id, payload))
}

fn status_of(err: &StoreError) -> u8 {
    match err {
        StoreError::NotFound { .. } => ST_NOT_FOUND,
        StoreError::AlreadyExists { .. } => ST_ALREADY_EXISTS,
        StoreError::InvalidFormat => ST_INVALID_FORMAT,
    }
}

// --- HANDLERS ---

async fn handle_create<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    body: &[u8],
    store: &Arc<ConfigStore>,
) -> std::io::Result<()> {
    let Some((id, payload)) = decode_id_payload(body) else {
        writer.write_all(&[ST_BAD_REQUEST]).await?;
        return Ok(());
    };

    match store.create(id, payload) {
        Ok(()) => writer.write_all(&[ST_OK]).await?,
        Err(e) => writer.write_all(&[status_of(&e)]).await?,
    }
    Ok(())
}

async fn handle_read<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    body: &[u8],
    store: &Arc<ConfigStore>,
) -> std::io::Result<()> {
    let Some(id) = decode_id(body) else {
        writer.write_all(&[ST_BAD_REQUEST]).await?;
        return Ok(());
    };

    match store.read(id) {
        Ok(payload) => {
            writer.write_all(&[ST_OK]).await?;
            let len = (payload.len() as u32).to_le_bytes();
            writer.write_all(&len).await?;
            writer.write_all(payload.as_bytes()).await?;
        }
        Err(e) => writer.write_all(&[status_of(&e)]).await?,
    }
    Ok(())
}

async fn handle_update<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    body: &[u8],
    store: &Arc<ConfigStore>,
) -> std::io::Result<()> {
    let Some((id, payload)) = decode_id_payload(body) else {
        writer.write_all(&[ST_BAD_REQUEST]).await?;
        return Ok(());
    };

    match store.update(id, payload) {
        Ok(()) => writer.write_all(&[ST_OK]).await?,
        Err(e) => writer.write_all(&[status_of(&e)]).await?,
    }
    Ok(())
}

async fn handle_delete<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    body: &[u8],
    store: &Arc<ConfigStore>,
) -> std::io::Result<()> {
    let Some(id) = decode_id(body) else {
        writer.write_all(&[ST_BAD_REQUEST]).await?;
        return Ok(());
    };

    match store.delete(id) {
        Ok(()) => writer.write_all(&[ST_OK]).await?,
        Err(e) => writer.write_all(&[status_of(&e)]).await?,
    }
    Ok(())
}

async fn handle_deploy<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    body: &[u8],
    store: &Arc<ConfigStore>,
) -> std::io::Result<()> {
    let Some(id) = decode_id(body) else {
        writer.write_all(&[ST_BAD_REQUEST]).await?;
        return Ok(());
    };

    match store.deploy_changes(id) {
        Ok(()) => writer.write_all(&[ST_OK]).await?,
        Err(e) => writer.write_all(&[status_of(&e)]).await?,
    }
    Ok(())
}

async fn handle_rollback<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    body: &[u8],
    store: &Arc<ConfigStore>,
) -> std::io::Result<()> {
    let Some((id, payload)) = decode_id_payload(body) else {
        writer.write_all(&[ST_BAD_REQUEST]).await?;
        return Ok(());
    };

    match store.rollback(id, payload) {
        Ok(()) => writer.write_all(&[ST_OK]).await?,
        Err(e) => writer.write_all(&[status_of(&e)]).await?,
    }
    Ok(())
}

// Response: [ST_OK][count u32] then per entry
// [ts_len u32][ts][desc_len u32][desc]
async fn handle_history<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    store: &Arc<ConfigStore>,
) -> std::io::Result<()> {
    let entries = store.history();

    writer.write_all(&[ST_OK]).await?;
    let count = (entries.len() as u32).to_le_bytes();
    writer.write_all(&count).await?;

    for entry in entries {
        let ts_len = (entry.timestamp.len() as u32).to_le_bytes();
        writer.write_all(&ts_len).await?;
        writer.write_all(entry.timestamp.as_bytes()).await?;

        let desc_len = (entry.description.len() as u32).to_le_bytes();
        writer.write_all(&desc_len).await?;
        writer.write_all(entry.description.as_bytes()).await?;
    }
    Ok(())
}
