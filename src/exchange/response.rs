use {
    crate::{Error, Result, utils::escape_html},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    std::io,
};

/// The response being built for the current request.
///
/// Status and headers can be changed until the response is committed. The
/// first body write, [`send_redirect`](Response::send_redirect) and
/// [`send_error`](Response::send_error) commit it; after that only more body
/// bytes can be appended and any status or header change fails with
/// [`ResponseCommitted`](crate::ErrorKind::ResponseCommitted).
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    committed: bool,
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            committed: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> Result<()> {
        self.ensure_uncommitted("set status")?;
        self.status = status;
        Ok(())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The first value of header `name` when it is valid UTF-8.
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Sets a header, replacing any previous values.
    pub fn set_header(&mut self, name: HeaderName, value: &str) -> Result<()> {
        self.ensure_uncommitted("set header")?;
        let value = HeaderValue::from_str(value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Appends a header value, keeping previous values.
    pub fn add_header(&mut self, name: HeaderName, value: &str) -> Result<()> {
        self.ensure_uncommitted("add header")?;
        let value = HeaderValue::from_str(value)?;
        self.headers.append(name, value);
        Ok(())
    }

    pub fn set_content_type(&mut self, content_type: &str) -> Result<()> {
        self.set_header(header::CONTENT_TYPE, content_type)
    }

    /// Appends bytes to the body and commits the response.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.committed = true;
        self.body.extend_from_slice(bytes);
        Ok(())
    }

    pub fn write_str(&mut self, text: &str) -> Result<()> {
        self.write(text.as_bytes())
    }

    /// Sends a `302 Found` to `location` and commits the response.
    pub fn send_redirect(&mut self, location: &str) -> Result<()> {
        self.ensure_uncommitted("send redirect")?;
        let location = HeaderValue::from_str(location)?;
        self.status = StatusCode::FOUND;
        self.headers.insert(header::LOCATION, location);
        self.committed = true;
        Ok(())
    }

    /// Replaces the body with a small HTML error page and commits the response.
    pub fn send_error(&mut self, status: StatusCode, message: &str) -> Result<()> {
        self.ensure_uncommitted("send error")?;
        self.status = status;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html;charset=UTF-8"),
        );
        self.body = format!(
            "<h1>{} {}</h1><p>{}</p>",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            escape_html(message)
        )
        .into_bytes();
        self.committed = true;
        Ok(())
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body decoded as UTF-8, with invalid sequences replaced.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, Vec<u8>) {
        (self.status, self.headers, self.body)
    }

    fn ensure_uncommitted(&self, action: &str) -> Result<()> {
        if self.committed {
            Err(Error::response_committed(format!(
                "cannot {action}: response already committed"
            )))
        } else {
            Ok(())
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

/// Lets handlers use `write!` and other `io::Write` helpers on the body.
impl io::Write for Response {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.committed = true;
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.committed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::io::Write as _;

    #[test]
    fn test_defaults() {
        let response = Response::new();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().is_empty());
        assert!(response.body().is_empty());
        assert!(!response.is_committed());
    }

    #[test]
    fn test_status_and_headers_before_commit() {
        let mut response = Response::new();
        response.set_status(StatusCode::CREATED).unwrap();
        response.set_content_type("text/plain").unwrap();
        response
            .add_header(header::SET_COOKIE, "a=1; Path=/")
            .unwrap();
        response
            .add_header(header::SET_COOKIE, "b=2; Path=/")
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.header(header::CONTENT_TYPE), Some("text/plain"));
        assert_eq!(
            response.headers().get_all(header::SET_COOKIE).iter().count(),
            2
        );
    }

    #[test]
    fn test_write_commits() {
        let mut response = Response::new();
        response.write_str("hello ").unwrap();
        write!(response, "{}!", "world").unwrap();

        assert!(response.is_committed());
        assert_eq!(response.body_text(), "hello world!");

        for err in [
            response.set_status(StatusCode::NOT_FOUND).unwrap_err(),
            response.set_header(header::CONTENT_TYPE, "x").unwrap_err(),
            response.add_header(header::SET_COOKIE, "x=y").unwrap_err(),
            response.send_redirect("/").unwrap_err(),
            response.send_error(StatusCode::FORBIDDEN, "no").unwrap_err(),
        ] {
            assert_eq!(err.kind(), ErrorKind::ResponseCommitted);
        }
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_send_redirect() {
        let mut response = Response::new();
        response.send_redirect("/").unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.header(header::LOCATION), Some("/"));
        assert!(response.is_committed());
    }

    #[test]
    fn test_send_error_escapes_message() {
        let mut response = Response::new();
        response
            .send_error(StatusCode::FORBIDDEN, "<b>nope</b>")
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.body_text(),
            "<h1>403 Forbidden</h1><p>&lt;b&gt;nope&lt;/b&gt;</p>"
        );
        assert!(response.is_committed());
    }

    #[test]
    fn test_invalid_header_value() {
        let mut response = Response::new();
        let err = response
            .set_header(header::LOCATION, "bad\r\nvalue")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(!response.is_committed());
    }

    #[test]
    fn test_into_parts() {
        let mut response = Response::new();
        response.set_status(StatusCode::ACCEPTED).unwrap();
        response.write_str("ok").unwrap();
        let (status, _, body) = response.into_parts();
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, b"ok");
    }
}
