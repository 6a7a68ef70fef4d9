use std::io::{self, Read, Write};
use std::net::TcpStream;

use confdb::parser::{self, Command};
use confdb::server::{
    OP_CREATE, OP_DELETE, OP_DEPLOY, OP_HISTORY, OP_READ, OP_ROLLBACK, OP_UPDATE,
    ST_ALREADY_EXISTS, ST_BAD_REQUEST, ST_INVALID_FORMAT, ST_NOT_FOUND, ST_OK,
};

const HOST: &str = "127.0.0.1:9400";

fn main() {
    print_banner();

    match TcpStream::connect(HOST) {
        Ok(_) => println!("[\u{2713}] Connected to confdb at {}!", HOST),
        Err(_) => {
            println!("[\u{2717}] Could not connect to server at {}.", HOST);
            println!("    Make sure to run 'cargo run --release' in another terminal.");
            return;
        }
    }
    println!("Type 'HELP' for supported commands or 'EXIT' to quit.\n");

    let stdin = io::stdin();
    let mut buffer = String::new();

    loop {
        print!("confdb> ");
        io::stdout().flush().expect("stdout flush failed");
        buffer.clear();

        if stdin.read_line(&mut buffer).expect("stdin read failed") == 0 {
            break;
        }
        if buffer.trim().is_empty() {
            continue;
        }

        match parser::parse_command(&buffer) {
            Ok(cmd) => {
                if let Err(e) = execute_command(cmd) {
                    println!("[\u{26a0}\u{fe0f} Error] {}", e);
                }
            }
            Err(e) => {
                println!("[\u{2717} Syntax Error] {}", e);
                println!("    \u{2139}\u{fe0f}  Hint: CREATE 'id' {{\"key\": \"value\"}}");
            }
        }
    }
}

fn print_banner() {
    println!("\n==================================================");
    println!("   confdb CLI v0.1 - Configuration Record Store");
    println!("==================================================\n");
}

fn print_help() {
    println!("\n--- Available Commands ---");
    println!("1. CREATE:    CREATE 'id' {{\"key\": \"value\"}}");
    println!("2. READ:      READ 'id'");
    println!("3. UPDATE:    UPDATE 'id' {{\"key\": \"new\"}}");
    println!("4. DELETE:    DELETE 'id'");
    println!("5. DEPLOY:    DEPLOY 'id'");
    println!("6. ROLLBACK:  ROLLBACK 'id' {{\"key\": \"previous\"}}");
    println!("7. HISTORY:   HISTORY");
    println!("8. EXIT:      Quit\n");
}

fn execute_command(cmd: Command) -> Result<(), String> {
    match cmd {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Create { id, payload } => {
            perform_mutation(OP_CREATE, &id, Some(&payload), "created")
        }
        Command::Read { id } => perform_read(&id),
        Command::Update { id, payload } => {
            perform_mutation(OP_UPDATE, &id, Some(&payload), "updated")
        }
        Command::Delete { id } => perform_mutation(OP_DELETE, &id, None, "deleted"),
        Command::Deploy { id } => perform_mutation(OP_DEPLOY, &id, None, "changes deployed"),
        Command::Rollback { id, payload } => {
            perform_mutation(OP_ROLLBACK, &id, Some(&payload), "rolled back")
        }
        Command::History => perform_history(),
        Command::Exit => std::process::exit(0),
    }
}

// --- NETWORK HANDLERS ---

fn send_frame(stream: &mut TcpStream, op: u8, body: &[u8]) -> io::Result<()> {
    stream.write_all(&[op])?;
    stream.write_all(&(body.len() as u32).to_le_bytes())?;
    stream.write_all(body)
}

// Payload-bearing ops frame the id with a u16 length prefix so the
// JSON text can occupy the rest of the body untouched.
fn encode_id_payload(id: &str, payload: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 + id.len() + payload.len());
    body.extend_from_slice(&(id.len() as u16).to_le_bytes());
    body.extend_from_slice(id.as_bytes());
    body.extend_from_slice(payload.as_bytes());
    body
}

fn status_message(status: u8, id: &str) -> String {
    match status {
        ST_NOT_FOUND => format!("Configuration ID {} not found.", id),
        ST_ALREADY_EXISTS => format!("Configuration ID {} already exists.", id),
        ST_INVALID_FORMAT => "Invalid JSON format.".to_string(),
        ST_BAD_REQUEST => "Server rejected the request frame.".to_string(),
        _ => format!("Unexpected status: 0x{:02X}", status),
    }
}

fn perform_mutation(op: u8, id: &str, payload: Option<&str>, verb: &str) -> Result<(), String> {
    let mut stream = TcpStream::connect(HOST).map_err(|e| e.to_string())?;

    let body = match payload {
        Some(p) => encode_id_payload(id, p),
        None => id.as_bytes().to_vec(),
    };
    send_frame(&mut stream, op, &body).map_err(|e| e.to_string())?;

    let mut status = [0u8; 1];
    stream.read_exact(&mut status).map_err(|e| e.to_string())?;

    if status[0] == ST_OK {
        println!("[\u{2713} OK] Configuration {} {} successfully.", id, verb);
        Ok(())
    } else {
        Err(status_message(status[0], id))
    }
}

fn perform_read(id: &str) -> Result<(), String> {
    let mut stream = TcpStream::connect(HOST).map_err(|e| e.to_string())?;
    send_frame(&mut stream, OP_READ, id.as_bytes()).map_err(|e| e.to_string())?;

    let mut status = [0u8; 1];
    stream.read_exact(&mut status).map_err(|e| e.to_string())?;

    if status[0] != ST_OK {
        return Err(status_message(status[0], id));
    }

    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).map_err(|e| e.to_string())?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).map_err(|e| e.to_string())?;

    println!("Payload: {}", String::from_utf8_lossy(&payload));
    Ok(())
}

fn perform_history() -> Result<(), String> {
    let mut stream = TcpStream::connect(HOST).map_err(|e| e.to_string())?;
    send_frame(&mut stream, OP_HISTORY, &[]).map_err(|e| e.to_string())?;

    let mut status = [0u8; 1];
    stream.read_exact(&mut status).map_err(|e| e.to_string())?;
    if status[0] != ST_OK {
        return Err(status_message(status[0], ""));
    }

    let mut count_buf = [0u8; 4];
    stream.read_exact(&mut count_buf).map_err(|e| e.to_string())?;
    let count = u32::from_le_bytes(count_buf);

    if count == 0 {
        println!("No change history available.");
        return Ok(());
    }

    println!("Configuration Change History:");
    for _ in 0..count {
        let timestamp = read_string(&mut stream)?;
        let description = read_string(&mut stream)?;
        println!("  [{}] {}", timestamp, description);
    }
    Ok(())
}

fn read_string(stream: &mut TcpStream) -> Result<String, String> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).map_err(|e| e.to_string())?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).map_err(|e| e.to_string())?;
    String::from_utf8(buf).map_err(|e| e.to_string())
}
