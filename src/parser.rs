use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, multispace1},
    combinator::{opt, rest},
    IResult,
};

/// The closed set of operations an adapter can dispatch on.
///
/// The store core never sees this grammar; the enum is the boundary
/// between presentation and the programmatic API.
#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    Create { id: String, payload: String },
    Read { id: String },
    Update { id: String, payload: String },
    Delete { id: String },
    Deploy { id: String },
    Rollback { id: String, payload: String },
    History,
    Help,
    Exit,
}

// --- BASIC PARSERS ---

fn parse_id(input: &str) -> IResult<&str, String> {
    let (input, _) = opt(char('\''))(input)?;
    let (input, id) = take_while1(|c: char| !c.is_whitespace() && c != '\'')(input)?;
    let (input, _) = opt(char('\''))(input)?;
    Ok((input, id.to_string()))
}

/// Everything after the id is the JSON document, taken verbatim.
fn parse_payload(input: &str) -> IResult<&str, String> {
    let (input, body) = rest(input)?;
    let body = body.trim();
    if body.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::NonEmpty,
        )));
    }
    Ok(("", body.to_string()))
}

// --- HELPERS ---
fn tag_ci(t: &'static str) -> impl FnMut(&str) -> IResult<&str, &str> {
    move |input| tag_no_case(t)(input)
}

// --- COMMAND PARSERS ---

fn parse_create(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("CREATE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, id) = parse_id(input)?;
    let (input, _) = multispace1(input)?;
    let (input, payload) = parse_payload(input)?;
    Ok((input, Command::Create { id, payload }))
}

fn parse_read(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_ci("READ"), tag_ci("GET")))(input)?;
    let (input, _) = multispace1(input)?;
    let (input, id) = parse_id(input)?;
    Ok((input, Command::Read { id }))
}

fn parse_update(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("UPDATE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, id) = parse_id(input)?;
    let (input, _) = multispace1(input)?;
    let (input, payload) = parse_payload(input)?;
    Ok((input, Command::Update { id, payload }))
}

fn parse_delete(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("DELETE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, id) = parse_id(input)?;
    Ok((input, Command::Delete { id }))
}

fn parse_deploy(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("DEPLOY")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, id) = parse_id(input)?;
    Ok((input, Command::Deploy { id }))
}

fn parse_rollback(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("ROLLBACK")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, id) = parse_id(input)?;
    let (input, _) = multispace1(input)?;
    let (input, payload) = parse_payload(input)?;
    Ok((input, Command::Rollback { id, payload }))
}

fn parse_history(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("HISTORY")(input)?;
    Ok((input, Command::History))
}

fn parse_help(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("HELP")(input)?;
    Ok((input, Command::Help))
}

fn parse_exit(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_ci("EXIT"), tag_ci("QUIT")))(input)?;
    Ok((input, Command::Exit))
}

pub fn parse_command(input: &str) -> Result<Command, String> {
    let input = input.trim();
    let result = alt((
        parse_create,
        parse_read,
        parse_update,
        parse_delete,
        parse_deploy,
        parse_rollback,
        parse_history,
        parse_help,
        parse_exit,
    ))(input);

    match result {
        Ok((remainder, cmd)) => {
            if !remainder.trim().is_empty() {
                return Err(format!("Unexpected tokens at end: '{}'", remainder));
            }
            Ok(cmd)
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let context = if e.input.len() > 20 {
                format!("{}...", &e.input[..20])
            } else {
                e.input.to_string()
            };
            Err(format!("Invalid syntax near: '{}'", context))
        }
        Err(nom::Err::Incomplete(_)) => Err("Incomplete command.".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_with_quoted_id() {
        let cmd = parse_command("CREATE 'db' {\"host\": \"a\"}").unwrap();
        assert_eq!(
            cmd,
            Command::Create {
                id: "db".to_string(),
                payload: "{\"host\": \"a\"}".to_string()
            }
        );
    }

    #[test]
    fn read_accepts_get_alias_and_bare_id() {
        assert_eq!(
            parse_command("get db").unwrap(),
            Command::Read { id: "db".to_string() }
        );
    }

    #[test]
    fn rollback_takes_payload_verbatim() {
        let cmd = parse_command("rollback db  {\"host\":\"a\"}  ").unwrap();
        assert_eq!(
            cmd,
            Command::Rollback {
                id: "db".to_string(),
                payload: "{\"host\":\"a\"}".to_string()
            }
        );
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(parse_command("history").unwrap(), Command::History);
        assert_eq!(parse_command("QUIT").unwrap(), Command::Exit);
    }

    #[test]
    fn trailing_junk_is_rejected() {
        assert!(parse_command("DELETE 'db' extra").is_err());
        assert!(parse_command("CREATE 'db'").is_err());
        assert!(parse_command("FLY 'db'").is_err());
    }
}
