use std::io;

/// Decides whether a read error means the peer is gone for good.
///
/// Benign terminations end the read loop silently, exactly like end-of-stream.
/// Everything else is logged and the loop tries the next read.
pub trait TerminationClassifier: Send + Sync {
    fn is_benign_termination(&self, err: &io::Error) -> bool;
}

impl<F> TerminationClassifier for F
where
    F: Fn(&io::Error) -> bool + Send + Sync,
{
    fn is_benign_termination(&self, err: &io::Error) -> bool {
        self(err)
    }
}

/// Matches `UnexpectedEof` plus a list of case-insensitive error text markers.
///
/// Windows reports a peer closing its socket mid-receive as an error whose text
/// contains `wsarecv`, which is the default marker.
#[derive(Debug, Clone)]
pub struct MarkerClassifier {
    markers: Vec<String>,
}

impl MarkerClassifier {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|marker| marker.as_ref().to_ascii_lowercase())
                .filter(|marker| !marker.is_empty())
                .collect(),
        }
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }
}

impl Default for MarkerClassifier {
    fn default() -> Self {
        Self::new(["wsarecv"])
    }
}

impl TerminationClassifier for MarkerClassifier {
    fn is_benign_termination(&self, err: &io::Error) -> bool {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            return true;
        }
        if self.markers.is_empty() {
            return false;
        }
        let text = err.to_string().to_ascii_lowercase();
        self.markers.iter().any(|marker| text.contains(marker.as_str()))
    }
}
