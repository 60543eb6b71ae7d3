//! Indentation tracking for significant whitespace
//!
//! Block structure is carried by INDENT/DEDENT tokens derived from the
//! leading-whitespace width of each logical line.

/// Stack of open indentation widths. The base level 0 is always present.
#[derive(Debug)]
pub(super) struct IndentStack {
    levels: Vec<usize>,
}

/// What a new line's indentation means relative to the open blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum IndentChange {
    /// Same width as the enclosing block
    None,
    /// One block opened
    Indent,
    /// This many blocks closed
    Dedent(usize),
}

impl IndentStack {
    pub(super) fn new() -> Self {
        Self { levels: vec![0] }
    }

    /// Current indentation width.
    pub(super) fn current(&self) -> usize {
        *self.levels.last().unwrap_or(&0)
    }

    /// Register the indentation width of a new logical line.
    ///
    /// A dedent must land exactly on an enclosing level; anything else is an
    /// inconsistency the caller reports as a syntax error.
    pub(super) fn step(&mut self, width: usize) -> Result<IndentChange, &'static str> {
        let current = self.current();
        if width > current {
            self.levels.push(width);
            return Ok(IndentChange::Indent);
        }
        if width == current {
            return Ok(IndentChange::None);
        }

        let mut closed = 0;
        while self.current() > width {
            self.levels.pop();
            closed += 1;
        }
        if self.current() != width {
            return Err("unindent does not match any outer indentation level");
        }
        Ok(IndentChange::Dedent(closed))
    }

    /// Close every open block at end of input; returns the DEDENT count.
    pub(super) fn close(&mut self) -> usize {
        let open = self.levels.len().saturating_sub(1);
        self.levels.truncate(1);
        open
    }
}
