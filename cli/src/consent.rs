//! Interactive consent over the REPL's own stdin.

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncRead, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use warden_engine::{ConsentDecision, ConsentFut, ConsentGate, ConsentRequest};

/// Line reader shared by the prompt loop and the consent gate.
pub type SharedLines<R = Stdin> = Arc<Mutex<Lines<BufReader<R>>>>;

pub struct TerminalConsent<R = Stdin> {
    lines: SharedLines<R>,
}

impl<R> TerminalConsent<R> {
    pub fn new(lines: SharedLines<R>) -> Self {
        Self { lines }
    }
}

impl<R> ConsentGate for TerminalConsent<R>
where
    R: AsyncRead + Unpin + Send,
{
    fn request<'a>(&'a self, request: &'a ConsentRequest) -> ConsentFut<'a> {
        Box::pin(async move {
            print!("\nAllow {}? [y/N] ", request.summary);
            let _ = std::io::stdout().flush();

            let answer = self.lines.lock().await.next_line().await;
            let decision = decision_from(answer);
            tracing::info!(
                tool = %request.tool_name,
                granted = decision.is_granted(),
                "Consent answered"
            );
            decision
        })
    }
}

/// EOF and read errors deny.
fn decision_from(answer: std::io::Result<Option<String>>) -> ConsentDecision {
    match answer {
        Ok(Some(line)) => parse_answer(&line),
        Ok(None) => ConsentDecision::Denied,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read consent answer");
            ConsentDecision::Denied
        }
    }
}

fn parse_answer(line: &str) -> ConsentDecision {
    let answer = line.trim();
    if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
        ConsentDecision::Granted
    } else {
        ConsentDecision::Denied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio::io::AsyncBufReadExt;
    use warden_engine::ToolName;

    fn gate_over(input: &'static [u8]) -> (TerminalConsent<&'static [u8]>, SharedLines<&'static [u8]>) {
        let lines = Arc::new(Mutex::new(BufReader::new(input).lines()));
        (TerminalConsent::new(Arc::clone(&lines)), lines)
    }

    fn write_request() -> ConsentRequest {
        ConsentRequest {
            tool_name: ToolName::WriteFile,
            path: PathBuf::from("/p/a.txt"),
            summary: "write_file /p/a.txt (5 bytes)".to_string(),
        }
    }

    #[test]
    fn only_yes_grants() {
        assert_eq!(parse_answer("y"), ConsentDecision::Granted);
        assert_eq!(parse_answer(" YES \n"), ConsentDecision::Granted);
        assert_eq!(parse_answer(""), ConsentDecision::Denied);
        assert_eq!(parse_answer("n"), ConsentDecision::Denied);
        assert_eq!(parse_answer("yeah"), ConsentDecision::Denied);
    }

    #[test]
    fn read_error_denies() {
        let err = std::io::Error::other("stdin closed");
        assert_eq!(decision_from(Err(err)), ConsentDecision::Denied);
    }

    #[tokio::test]
    async fn eof_while_waiting_denies() {
        let (gate, _) = gate_over(b"");
        assert_eq!(gate.request(&write_request()).await, ConsentDecision::Denied);
    }

    #[tokio::test]
    async fn answer_consumes_exactly_one_line() {
        let (gate, lines) = gate_over(b"yes\nnext message\n");
        assert_eq!(gate.request(&write_request()).await, ConsentDecision::Granted);

        let next = lines.lock().await.next_line().await.unwrap();
        assert_eq!(next.as_deref(), Some("next message"));
    }

    #[tokio::test]
    async fn other_answers_deny() {
        let (gate, _) = gate_over(b"no\n");
        assert_eq!(gate.request(&write_request()).await, ConsentDecision::Denied);
    }
}
