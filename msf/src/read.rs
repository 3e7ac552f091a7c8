//! Code for reading stream contents.

use super::*;

impl<F: ReadAt> Msf<F> {
    /// Reads an entire stream to a vector.
    ///
    /// The stream's pages are concatenated and the result is truncated to the
    /// stream's declared byte size. Nil streams read back as empty.
    pub fn read_stream_to_vec(&self, stream: u32) -> Result<Vec<u8>, MsfError> {
        let (stream_size, pages) = self.stream_size_and_pages(stream)?;

        let mut stream_data: Vec<u8> = vec![0; stream_size as usize];
        let page_size = usize::from(self.page_size);

        for (chunk, &page) in stream_data.chunks_mut(page_size).zip(pages.iter()) {
            // The last page of a stream is usually partial; reading only
            // `chunk.len()` bytes also keeps us inside the file when the
            // stream ends in the file's final page.
            self.file
                .read_exact_at(chunk, page_to_offset(page, self.page_size))?;
        }

        Ok(stream_data)
    }
}
