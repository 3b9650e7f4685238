//! Scripted in-memory transport for exercising `HttpClient` without a network.
//!
//! Each handle records every option it receives and replays queued
//! `Exchange`s from `perform`, one per call.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use http_facade::{
    HeaderSink, RequestBody, Transport, TransportFailure, TransportHandle, TransportInfo,
    TransportOption,
};

/// One scripted round-trip.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub header_lines: Vec<String>,
    pub status: u16,
    pub body: Result<Vec<u8>, TransportFailure>,
}

impl Exchange {
    /// A complete response. The status is read from the last status line in
    /// `lines`; lines get CRLF terminators and the block a closing blank line.
    pub fn response(lines: &[&str], body: &str) -> Self {
        let status = lines
            .iter()
            .filter(|line| line.starts_with("HTTP/"))
            .last()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse().ok())
            .unwrap_or(0);
        let mut header_lines: Vec<String> = lines.iter().map(|line| format!("{line}\r\n")).collect();
        header_lines.push("\r\n".to_string());
        Self {
            header_lines,
            status,
            body: Ok(body.as_bytes().to_vec()),
        }
    }

    pub fn status(status: u16, reason: &str) -> Self {
        Self::response(&[&format!("HTTP/1.1 {status} {reason}")], "")
    }

    pub fn failure(code: u32, message: &str) -> Self {
        Self {
            header_lines: Vec::new(),
            status: 0,
            body: Err(TransportFailure::new(code, message)),
        }
    }
}

/// What a handle was configured with when `perform` ran.
#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub method: String,
    pub url: String,
    pub body: RequestBody,
    pub headers: Vec<String>,
    pub cookie: Option<String>,
}

#[derive(Debug, Default)]
pub struct State {
    pub opened: usize,
    pub closed: usize,
    /// Options received by each handle, indexed by open order.
    pub options: Vec<Vec<TransportOption>>,
    pub sent: Vec<Sent>,
    pub queue: VecDeque<Exchange>,
}

#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    pub state: Rc<RefCell<State>>,
    pub available: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State::default())),
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn push(&self, exchange: Exchange) -> &Self {
        self.state.borrow_mut().queue.push_back(exchange);
        self
    }

    pub fn last_sent(&self) -> Sent {
        self.state.borrow().sent.last().cloned().expect("nothing was sent")
    }

    /// Options received by the most recently opened handle.
    pub fn current_options(&self) -> Vec<TransportOption> {
        self.state.borrow().options.last().cloned().unwrap_or_default()
    }
}

impl Transport for ScriptedTransport {
    type Handle = ScriptedHandle;

    fn is_available(&self) -> bool {
        self.available
    }

    fn open(&self) -> Result<ScriptedHandle, http_facade::ClientError> {
        let mut state = self.state.borrow_mut();
        state.opened += 1;
        state.options.push(Vec::new());
        Ok(ScriptedHandle {
            index: state.options.len() - 1,
            state: Rc::clone(&self.state),
            sent: Sent {
                method: "GET".to_string(),
                url: String::new(),
                body: RequestBody::Empty,
                headers: Vec::new(),
                cookie: None,
            },
            last: TransportInfo::default(),
            closed: false,
        })
    }
}

pub struct ScriptedHandle {
    index: usize,
    state: Rc<RefCell<State>>,
    sent: Sent,
    last: TransportInfo,
    closed: bool,
}

impl TransportHandle for ScriptedHandle {
    fn set_option(&mut self, option: TransportOption) {
        match &option {
            TransportOption::Method(method) => self.sent.method = method.clone(),
            TransportOption::Url(url) => self.sent.url = url.clone(),
            TransportOption::Body(body) => self.sent.body = body.clone(),
            TransportOption::Headers(headers) => self.sent.headers = headers.clone(),
            TransportOption::Cookie(cookie) => self.sent.cookie = Some(cookie.clone()),
            _ => {}
        }
        self.state.borrow_mut().options[self.index].push(option);
    }

    fn perform(&mut self, sink: &mut dyn HeaderSink) -> Result<Vec<u8>, TransportFailure> {
        let exchange = {
            let mut state = self.state.borrow_mut();
            state.sent.push(self.sent.clone());
            state
                .queue
                .pop_front()
                .unwrap_or_else(|| Exchange::status(200, "OK"))
        };

        let mut request_headers = format!("{} {} HTTP/1.1\r\n", self.sent.method, self.sent.url);
        for line in &self.sent.headers {
            request_headers.push_str(line);
            request_headers.push_str("\r\n");
        }
        request_headers.push_str("\r\n");

        for line in &exchange.header_lines {
            assert_eq!(sink.header_line(line.as_bytes()), line.len());
        }
        self.last = TransportInfo {
            status: exchange.status,
            effective_url: self.sent.url.clone(),
            request_headers,
            ..TransportInfo::default()
        };
        exchange.body
    }

    fn info(&self) -> TransportInfo {
        self.last.clone()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.borrow_mut().closed += 1;
        }
    }
}
