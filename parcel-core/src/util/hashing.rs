use std::io::{Read, Result, Write};

/// Write adapter that feeds every byte it forwards into a BLAKE3 hasher.
pub struct HashingWriter<'a, W: Write> {
    inner: W,
    hasher: &'a mut blake3::Hasher,
    pub counted: u64,
}

impl<'a, W: Write> HashingWriter<'a, W> {
    pub fn new(inner: W, hasher: &'a mut blake3::Hasher) -> Self {
        Self {
            inner,
            hasher,
            counted: 0,
        }
    }
}

impl<'a, W: Write> Write for HashingWriter<'a, W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.counted += n as u64;
        Ok(n)
    }
    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}

/// Read-side twin of [`HashingWriter`].
pub struct HashingReader<'a, R: Read> {
    inner: R,
    hasher: &'a mut blake3::Hasher,
    pub counted: u64,
}

impl<'a, R: Read> HashingReader<'a, R> {
    pub fn new(inner: R, hasher: &'a mut blake3::Hasher) -> Self {
        Self {
            inner,
            hasher,
            counted: 0,
        }
    }
}

impl<'a, R: Read> Read for HashingReader<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.counted += n as u64;
        Ok(n)
    }
}

/// Hash a whole file without keeping it in memory.
pub fn digest_file(path: &std::path::Path) -> Result<(blake3::Hash, u64)> {
    let mut hasher = blake3::Hasher::new();
    let n = {
        let f = std::fs::File::open(path)?;
        let mut r = HashingReader::new(f, &mut hasher);
        std::io::copy(&mut r, &mut std::io::sink())?
    };
    Ok((hasher.finalize(), n))
}
