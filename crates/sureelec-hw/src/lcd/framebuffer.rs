//! Character framebuffer mirroring the display.

use crate::scroll::ScrollDirection;
use crate::{Error, Result, PAD_BYTE};

/// Row-major grid of character cells, one byte per cell.
///
/// Lines are addressed 1-based, as the device addresses them. The grid is
/// sized once from the module's reported dimensions and never resized.
#[derive(Clone, PartialEq, Eq)]
pub struct Framebuffer {
    /// Character cells, `width * height` bytes.
    cells: Vec<u8>,
    /// Columns per line.
    width: usize,
    /// Number of lines.
    height: usize,
}

impl Framebuffer {
    /// Creates a framebuffer filled with the pad character.
    pub fn with_dimensions(width: usize, height: usize) -> Self {
        Self {
            cells: vec![PAD_BYTE; width * height],
            width,
            height,
        }
    }

    /// Returns the number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the number of lines.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns a reference to the raw cells.
    pub fn data(&self) -> &[u8] {
        &self.cells
    }

    /// Validates a 1-based line number and returns its row index.
    fn row_index(&self, line: usize) -> Result<usize> {
        if line < 1 || line > self.height {
            return Err(Error::InvalidLine {
                line,
                height: self.height,
            });
        }
        Ok(line - 1)
    }

    fn row_range(&self, index: usize) -> std::ops::Range<usize> {
        let start = index * self.width;
        start..start + self.width
    }

    /// Returns the cells of a line.
    pub fn row(&self, line: usize) -> Result<&[u8]> {
        let index = self.row_index(line)?;
        Ok(&self.cells[self.row_range(index)])
    }

    /// Iterates over all lines, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.cells.chunks(self.width.max(1))
    }

    /// Overwrites a whole line and returns its new cells.
    ///
    /// Text beyond the width is dropped and the rest of the line is padded,
    /// so nothing from an earlier, longer line survives. A NUL ends the
    /// text; other control bytes are stored as the pad character.
    pub fn write_line(&mut self, line: usize, text: &[u8]) -> Result<&[u8]> {
        let index = self.row_index(line)?;
        let text = match text.iter().position(|&b| b == 0) {
            Some(end) => &text[..end],
            None => text,
        };

        let range = self.row_range(index);
        let padded = text.iter().copied().chain(std::iter::repeat(PAD_BYTE));
        for (cell, byte) in self.cells[range.clone()].iter_mut().zip(padded) {
            *cell = if byte.is_ascii_control() { PAD_BYTE } else { byte };
        }

        Ok(&self.cells[range])
    }

    /// Fills every cell with the pad character.
    pub fn clear(&mut self) {
        self.cells.fill(PAD_BYTE);
    }

    /// Shifts lines by `distance` (clamped to the height).
    ///
    /// Without `wrap`, lines shifted off one edge are discarded and the
    /// lines opened at the other edge are padded. With `wrap`, they re-enter
    /// at the opposite edge.
    pub fn scroll(
        &mut self,
        direction: ScrollDirection,
        distance: usize,
        wrap: bool,
    ) -> Result<()> {
        let shift = distance.min(self.height) * self.width;
        let len = self.cells.len();

        match direction {
            ScrollDirection::Up => {
                self.cells.rotate_left(shift);
                if !wrap {
                    self.cells[len - shift..].fill(PAD_BYTE);
                }
            }
            ScrollDirection::Down => {
                self.cells.rotate_right(shift);
                if !wrap {
                    self.cells[..shift].fill(PAD_BYTE);
                }
            }
            ScrollDirection::Left | ScrollDirection::Right => {
                return Err(Error::UnsupportedDirection(direction));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framebuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("cells", &String::from_utf8_lossy(&self.cells))
            .finish()
    }
}
