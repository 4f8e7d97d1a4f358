use vte::{Params, Perform};

/// Zero-indexed cursor position on the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CursorPosition {
    pub row: u16,
    pub col: u16,
}

/// The character grid and cursor behind a `ScreenBuffer`.
///
/// Implements `vte::Perform`, so the parser drives it directly. The cursor is
/// kept inside `[0, rows) x [0, cols)` after every callback: running off the
/// right edge wraps to the next row, running off the bottom scrolls the grid.
pub(crate) struct Screen {
    cells: Vec<Vec<char>>,
    cols: usize,
    rows: usize,
    row: usize,
    col: usize,
}

impl Screen {
    pub(crate) fn new(cols: u16, rows: u16) -> Self {
        let cols = usize::from(cols.max(1));
        let rows = usize::from(rows.max(1));
        Self {
            cells: vec![vec![' '; cols]; rows],
            cols,
            rows,
            row: 0,
            col: 0,
        }
    }

    pub(crate) fn cols(&self) -> u16 {
        self.cols as u16
    }

    pub(crate) fn rows(&self) -> u16 {
        self.rows as u16
    }

    pub(crate) fn cursor(&self) -> CursorPosition {
        CursorPosition {
            row: self.row as u16,
            col: self.col as u16,
        }
    }

    /// Raw contents of one row, untrimmed.
    pub(crate) fn row_text(&self, row: usize) -> Option<String> {
        self.cells.get(row).map(|cells| cells.iter().collect())
    }

    /// Render the visible grid as plain text.
    ///
    /// Control characters other than tab are dropped, each line loses its
    /// trailing spaces and tabs, and trailing blank lines are removed.
    pub(crate) fn render(&self) -> String {
        let mut lines: Vec<String> = self
            .cells
            .iter()
            .map(|cells| {
                let line: String = cells
                    .iter()
                    .filter(|&&c| c == '\t' || !c.is_control())
                    .collect();
                line.trim_end_matches([' ', '\t']).to_string()
            })
            .collect();

        while lines.last().is_some_and(|line| line.trim().is_empty()) {
            lines.pop();
        }

        lines.join("\n")
    }

    fn put(&mut self, c: char) {
        self.cells[self.row][self.col] = c;
        self.col += 1;
        self.settle();
    }

    fn newline(&mut self) {
        self.row += 1;
        self.col = 0;
        self.settle();
    }

    /// Wrap past the right edge, then scroll past the bottom edge.
    fn settle(&mut self) {
        if self.col >= self.cols {
            self.col = 0;
            self.row += 1;
        }
        if self.row >= self.rows {
            self.scroll_up();
        }
    }

    fn scroll_up(&mut self) {
        self.cells.remove(0);
        self.cells.push(vec![' '; self.cols]);
        self.row = self.rows - 1;
    }

    fn clear(&mut self) {
        for row in &mut self.cells {
            row.fill(' ');
        }
    }

    /// Cursor position (CUP). Parameters are 1-indexed; a missing or zero
    /// parameter lands on the first row or column.
    fn goto(&mut self, params: &Params) {
        let mut iter = params.iter();
        let row = iter.next().and_then(|p| p.first().copied()).unwrap_or(0);
        let col = iter.next().and_then(|p| p.first().copied()).unwrap_or(0);

        self.row = usize::from(row.saturating_sub(1)).min(self.rows - 1);
        self.col = usize::from(col.saturating_sub(1)).min(self.cols - 1);
    }
}

impl Perform for Screen {
    fn print(&mut self, c: char) {
        self.put(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' => self.newline(),
            b'\r' => self.col = 0,
            b'\t' => self.put('\t'),
            0x08 => self.col = self.col.saturating_sub(1),
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], ignore: bool, action: char) {
        if ignore || !intermediates.is_empty() {
            return;
        }

        match action {
            'H' => self.goto(params),
            'J' => {
                let mode = params.iter().next().and_then(|p| p.first().copied());
                if mode == Some(2) {
                    self.clear();
                }
            }
            _ => {}
        }
    }
}
