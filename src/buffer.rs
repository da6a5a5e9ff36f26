use std::io::{self, Write};

/// A growable byte buffer with separate read and write cursors,
/// used to stage outbound response bytes between readiness events.
pub struct Buffer {
    data: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
}

impl Buffer {
    /// Create a new buffer with the specified initial capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            read_pos: 0,
            write_pos: 0,
        }
    }

    /// Append a slice of data to the buffer, growing it if needed
    pub fn write(&mut self, data: &[u8]) {
        self.ensure_capacity(data.len());
        self.data[self.write_pos..self.write_pos + data.len()].copy_from_slice(data);
        self.write_pos += data.len();
    }

    /// Write buffered data to a writer, advancing the read cursor
    /// by however many bytes the writer took
    pub fn write_to<W: Write>(&mut self, writer: &mut W) -> io::Result<usize> {
        let available = self.available_data();
        if available == 0 {
            return Ok(0);
        }

        let bytes_written = writer.write(&self.data[self.read_pos..self.write_pos])?;
        self.read_pos += bytes_written;

        if self.read_pos == self.write_pos {
            self.reset();
        }

        Ok(bytes_written)
    }

    /// Ensure there is room for at least `additional` bytes past the write cursor
    fn ensure_capacity(&mut self, additional: usize) {
        if self.data.len() - self.write_pos >= additional {
            return;
        }

        // Compact consumed bytes out of the front first
        if self.read_pos > 0 {
            self.data.copy_within(self.read_pos..self.write_pos, 0);
            self.write_pos -= self.read_pos;
            self.read_pos = 0;
        }

        let available_after_compact = self.data.len() - self.write_pos;
        if available_after_compact < additional {
            let new_capacity = (self.data.len() + additional).max(self.data.len() * 2);
            self.data.resize(new_capacity, 0);
        }
    }

    /// Reset the buffer, clearing all data
    pub fn reset(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }

    /// Get the amount of data available to read
    pub fn available_data(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Get a slice of the unconsumed data
    pub fn slice(&self) -> &[u8] {
        &self.data[self.read_pos..self.write_pos]
    }

    /// Get the total capacity of the buffer
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}
