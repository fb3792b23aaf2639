// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use std::io::BufRead;

/// Streaming reader that yields maximal runs of non-whitespace bytes.
///
/// Tokens never span line breaks; space, tab, CR and LF are the only
/// separators. The most recently returned token can be pushed back once
/// with [`Tokenizer::put`]. The internal token buffer is reused across
/// calls and grows as needed, so arbitrarily long lines are fine.
pub struct Tokenizer<R: BufRead> {
    input: R,
    token: Vec<u8>,
    put_back: bool,
    /// Line of the most recently returned token (1-based).
    token_line: u32,
    /// Line the reader is currently positioned on.
    line: u32,
    valid: bool,
}

impl<R: BufRead> Tokenizer<R> {
    pub fn new(input: R) -> Self {
        Tokenizer {
            input,
            token: Vec::with_capacity(64),
            put_back: false,
            token_line: 1,
            line: 1,
            valid: true,
        }
    }

    /// Returns the next token or `None` once the input is exhausted.
    /// End-of-input (and any I/O failure) flips [`Tokenizer::valid`] to false.
    pub fn next(&mut self) -> Option<&[u8]> {
        if self.put_back {
            self.put_back = false;
            return if self.token.is_empty() {
                None
            } else {
                Some(&self.token)
            };
        }

        self.token.clear();

        // skip separators in front of the token
        let first = loop {
            match self.read_byte() {
                None => return None,
                Some(b'\n') => self.line += 1,
                Some(b' ') | Some(b'\t') | Some(b'\r') => {}
                Some(other) => break other,
            }
        };

        self.token_line = self.line;
        self.token.push(first);

        loop {
            match self.read_byte() {
                None => break,
                Some(b'\n') => {
                    self.line += 1;
                    break;
                }
                Some(b' ') | Some(b'\t') | Some(b'\r') => break,
                Some(other) => self.token.push(other),
            }
        }

        Some(&self.token)
    }

    /// Un-consumes the most recent token. At most one level of putback.
    pub fn put(&mut self) {
        debug_assert!(!self.put_back, "only one token of putback is supported");
        self.put_back = true;
    }

    /// Returns the next token without consuming it.
    pub fn peek(&mut self) -> Option<&[u8]> {
        if self.next().is_none() {
            return None;
        }
        self.put_back = true;
        Some(&self.token)
    }

    /// Consumes the next token iff it matches `expected` exactly.
    pub fn expect(&mut self, expected: &[u8]) -> bool {
        match self.next() {
            Some(token) if token == expected => true,
            Some(_) => {
                self.put();
                false
            }
            None => false,
        }
    }

    /// Line of the most recently returned token (1-based).
    pub fn line_number(&self) -> u32 {
        self.token_line
    }

    /// False once the end of the input or an I/O error has been reached.
    pub fn valid(&self) -> bool {
        self.valid
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => {
                    self.valid = false;
                    return None;
                }
                Ok(_) => return Some(buf[0]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => {
                    // surfaced through valid() only, diagnostics are the caller's job
                    self.valid = false;
                    return None;
                }
            }
        }
    }
}
