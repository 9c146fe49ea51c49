//! Response head tracking for a streaming GET.
//!
//! Header lines arrive one at a time from curl. A new status line (after a
//! redirect) resets what was collected for the previous response.

/// Status and length of the response currently being received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ResponseHead {
    pub(crate) status: Option<u32>,
    pub(crate) content_length: Option<u64>,
}

impl ResponseHead {
    /// Feed one raw header line (may include the trailing CRLF).
    pub(crate) fn observe_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if line.starts_with("HTTP/") {
            *self = ResponseHead {
                status: parse_status_line(line),
                content_length: None,
            };
            return;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                self.content_length = value.trim().parse::<u64>().ok();
            }
        }
    }

    /// Unknown status counts as success (non-HTTP schemes never send one).
    pub(crate) fn is_success(&self) -> bool {
        self.status.map_or(true, |code| (200..300).contains(&code))
    }
}

fn parse_status_line(line: &str) -> Option<u32> {
    line.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_length() {
        let mut head = ResponseHead::default();
        head.observe_line("HTTP/1.1 200 OK\r\n");
        head.observe_line("Content-Length: 1000\r\n");
        head.observe_line("\r\n");
        assert_eq!(head.status, Some(200));
        assert_eq!(head.content_length, Some(1000));
        assert!(head.is_success());
    }

    #[test]
    fn redirect_resets_previous_response() {
        let mut head = ResponseHead::default();
        head.observe_line("HTTP/1.1 302 Found");
        head.observe_line("Content-Length: 12");
        assert!(!head.is_success());
        head.observe_line("HTTP/2 200");
        assert_eq!(head.status, Some(200));
        assert_eq!(head.content_length, None);
    }

    #[test]
    fn error_status_is_not_success() {
        let mut head = ResponseHead::default();
        head.observe_line("HTTP/1.1 404 Not Found");
        assert_eq!(head.status, Some(404));
        assert!(!head.is_success());
    }

    #[test]
    fn garbage_length_is_unknown() {
        let mut head = ResponseHead::default();
        head.observe_line("HTTP/1.1 200 OK");
        head.observe_line("content-length: lots");
        assert_eq!(head.content_length, None);
        assert!(ResponseHead::default().is_success());
    }
}
