use std::time::Instant;

use rouille::Response;


/// A response, plus the earliest time it may be sent (to slow down
/// password guessing).
pub struct AResponse {
    pub response: Response,
    pub sleep_until: Option<Instant>,
}

impl From<Response> for AResponse {
    fn from(response: Response) -> Self {
        Self {
            response,
            sleep_until: None
        }
    }
}

pub trait ToAResponse {
    fn to_aresponse(self, sleep_until: Option<Instant>) -> AResponse;
}

impl ToAResponse for Response {
    fn to_aresponse(self, sleep_until: Option<Instant>) -> AResponse {
        AResponse { response: self, sleep_until }
    }
}

impl AResponse {
    /// Sleep until `sleep_until`, if set and in the future.
    pub fn delay(&self) {
        if let Some(t) = self.sleep_until {
            if let Some(d) = t.checked_duration_since(Instant::now()) {
                std::thread::sleep(d);
            }
        }
    }
}
