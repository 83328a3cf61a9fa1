use indicatif::{ProgressBar, ProgressStyle};
use memmap2::{Mmap, MmapOptions};
use rand::Rng;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;
use tracing::warn;

use crate::compute::WORD_SIZE;
use crate::error::{Error, Result};

/// Exclusive upper bound of the integers written by [`generate_numbers`].
pub const NUMBER_UPPER_BOUND: u64 = 1 << 31;

const PROGRESS_STEP: u64 = 1 << 16;

/// Read-only memory map of a file of packed big-endian u32 values.
pub struct U32Blob {
    // Zero-length files cannot be mapped
    mmap: Option<Mmap>,
}

impl U32Blob {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        let file_size = file.metadata()?.len() as usize;

        if !file_size.is_multiple_of(WORD_SIZE) {
            warn!(
                "{} is {} bytes, not a multiple of {}; its last chunk cannot be summed",
                path.as_ref().display(),
                file_size,
                WORD_SIZE
            );
        }

        if file_size == 0 {
            return Ok(Self { mmap: None });
        }

        // The file must not be modified while mapped; nothing in this crate writes to it.
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        Ok(Self { mmap: Some(mmap) })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_words(&self) -> usize {
        self.len() / WORD_SIZE
    }
}

pub struct BlobWriter {
    writer: BufWriter<File>,
    words_written: u64,
}

impl BlobWriter {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        Ok(Self {
            writer: BufWriter::with_capacity(1024 * 1024, file), // 1MB buffer
            words_written: 0,
        })
    }

    pub fn write_word(&mut self, value: u32) -> Result<()> {
        self.writer.write_all(&value.to_be_bytes())?;
        self.words_written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush()?;
        Ok(self.words_written)
    }
}

/// Lazily parses a newline-delimited list of decimal integers.
pub struct NumberReader<R> {
    lines: Lines<R>,
    line_number: usize,
}

impl NumberReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> NumberReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for NumberReader<R> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            return Some(
                trimmed
                    .parse::<u64>()
                    .map_err(|e| Error::parse(self.line_number, format!("{:?}: {}", trimmed, e))),
            );
        }
    }
}

/// Write `count` random big-endian u32 values to `path`.
pub fn generate_blob<P, G>(path: P, count: u64, rng: &mut G, progress: Option<&ProgressBar>) -> Result<u64>
where
    P: AsRef<Path>,
    G: Rng,
{
    let mut writer = BlobWriter::new(path)?;
    for i in 0..count {
        writer.write_word(rng.gen())?;
        tick(progress, i, count);
    }
    writer.finish()
}

/// Write `count` random integers below [`NUMBER_UPPER_BOUND`], one per line.
pub fn generate_numbers<P, G>(path: P, count: u64, rng: &mut G, progress: Option<&ProgressBar>) -> Result<u64>
where
    P: AsRef<Path>,
    G: Rng,
{
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)?;
    let mut writer = BufWriter::new(file);

    for i in 0..count {
        writeln!(writer, "{}", rng.gen_range(0..NUMBER_UPPER_BOUND))?;
        tick(progress, i, count);
    }
    writer.flush()?;

    Ok(count)
}

fn tick(progress: Option<&ProgressBar>, i: u64, count: u64) {
    if let Some(pb) = progress {
        let done = i + 1;
        if done % PROGRESS_STEP == 0 || done == count {
            pb.set_position(done);
        }
    }
}

pub fn create_progress_bar(total: u64, unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{eta}})",
                unit
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}
