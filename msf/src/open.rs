//! Code for opening MSF files and reconstructing the stream directory.

use super::*;
use pow2::IntOnlyPow2;
use std::fs::File;
use std::path::Path;
use tracing::trace_span;
use zerocopy::{FromBytes, IntoBytes};

impl Msf<RandomAccessFile> {
    /// Opens an MSF file for read access, given a file name.
    pub fn open(file_name: &Path) -> Result<Self, MsfError> {
        let file = File::open(file_name)?;
        Self::from_file(RandomAccessFile::from(file))
    }
}

impl<F: ReadAt> Msf<F> {
    /// Reads the header and the stream directory of an MSF file and provides
    /// access to the streams contained within it.
    pub fn from_file(file: F) -> Result<Self, MsfError> {
        let _span = trace_span!("Msf::from_file").entered();

        let mut header_bytes = [0u8; MSF_HEADER_LEN];
        // If this read fails, the file is too small to be an MSF file of any kind.
        file.read_exact_at(&mut header_bytes, 0)?;

        if header_bytes.starts_with(&MSF_SMALL_MAGIC) {
            // The obsolete pre-7.0 encoding. Recognized, never read.
            return Err(MsfError::UnsupportedVersion);
        }
        if !header_bytes.starts_with(&MSF_MAGIC) {
            return Err(MsfError::UnsupportedVersion);
        }

        // unwrap() cannot fail; header_bytes has exactly the header size.
        let header = MsfHeader::read_from_bytes(header_bytes.as_slice()).unwrap();

        let Ok(page_size) = PageSize::try_from(header.page_size.get()) else {
            return Err(MsfError::Corrupt(format!(
                "page size {} is not a power of 2",
                header.page_size.get()
            )));
        };
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(MsfError::Corrupt(format!(
                "page size 0x{:x} is outside the supported range",
                header.page_size.get()
            )));
        }

        let num_pages = header.num_pages.get();
        if num_pages == 0 {
            return Err(MsfError::Corrupt("the file contains no pages".to_string()));
        }

        let stream_dir_size = header.stream_dir_size.get();
        if stream_dir_size == 0 || stream_dir_size % 4 != 0 {
            return Err(MsfError::Corrupt(format!(
                "stream directory size {stream_dir_size} is not a non-zero multiple of 4"
            )));
        }

        let check_page = |page: u32, role: &str| -> Result<(), MsfError> {
            if page == 0 || page >= num_pages {
                Err(MsfError::Corrupt(format!(
                    "{role} contains invalid page number {page} (file has {num_pages} pages)"
                )))
            } else {
                Ok(())
            }
        };

        // The page named by the header holds the list of directory pages.
        let map_page = header.stream_dir_map_page.get();
        check_page(map_page, "header")?;

        let num_dir_pages = stream_dir_size.div_round_up(page_size) as usize;
        if num_dir_pages * 4 > usize::from(page_size) {
            return Err(MsfError::Corrupt(format!(
                "stream directory needs {num_dir_pages} pages; its page list does not fit in one page"
            )));
        }

        let mut dir_page_list: Vec<U32<LE>> = vec![U32::new(0); num_dir_pages];
        file.read_exact_at(
            dir_page_list.as_mut_bytes(),
            page_to_offset(map_page, page_size),
        )?;

        // Concatenate the directory pages, then truncate to the declared size.
        let mut dir_bytes: Vec<u8> = vec![0; num_dir_pages * usize::from(page_size)];
        for (chunk, &dir_page) in dir_bytes
            .chunks_mut(usize::from(page_size))
            .zip(dir_page_list.iter())
        {
            let dir_page = dir_page.get();
            check_page(dir_page, "stream directory page list")?;
            file.read_exact_at(chunk, page_to_offset(dir_page, page_size))?;
        }
        dir_bytes.truncate(stream_dir_size as usize);

        // unwrap() cannot fail; the length is a multiple of 4 and U32 has no
        // alignment requirement.
        let dir: Vec<u32> = <[U32<LE>]>::ref_from_bytes(dir_bytes.as_slice())
            .unwrap()
            .iter()
            .map(|v| v.get())
            .collect();

        let Some(&num_streams) = dir.first() else {
            return Err(MsfError::Corrupt("stream directory is empty".to_string()));
        };
        let num_streams = num_streams as usize;

        let Some(stream_sizes) = dir.get(1..1 + num_streams) else {
            return Err(MsfError::Corrupt(format!(
                "stream directory declares {num_streams} streams but is too small to hold their sizes"
            )));
        };
        let stream_sizes = stream_sizes.to_vec();

        let mut rest = &dir[1 + num_streams..];
        let mut stream_pages: Vec<u32> = Vec::with_capacity(rest.len());
        let mut stream_page_starts: Vec<u32> = Vec::with_capacity(num_streams + 1);

        for (stream, &stream_size) in stream_sizes.iter().enumerate() {
            stream_page_starts.push(stream_pages.len() as u32);

            let num_stream_pages = num_pages_for_stream_size(stream_size, page_size) as usize;
            if num_stream_pages > rest.len() {
                return Err(MsfError::Corrupt(format!(
                    "stream {stream} has size {stream_size}, which exceeds the page lists in the directory"
                )));
            }

            let (this_stream_pages, next) = rest.split_at(num_stream_pages);
            rest = next;

            for &page in this_stream_pages {
                check_page(page, "stream page list")?;
            }
            stream_pages.extend_from_slice(this_stream_pages);
        }
        stream_page_starts.push(stream_pages.len() as u32);

        Ok(Self {
            file,
            page_size,
            num_pages,
            stream_sizes,
            stream_pages,
            stream_page_starts,
        })
    }
}
