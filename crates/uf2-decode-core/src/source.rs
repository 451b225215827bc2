use std::{
    cell::RefCell,
    io::{self, Read, Seek, SeekFrom},
};

/// Random access to the bytes of a candidate UF2 file.
///
/// `read` must return exactly `count` bytes or fail; a short read is reported
/// as [`io::ErrorKind::UnexpectedEof`].
pub trait ByteSource {
    fn length(&self) -> io::Result<u64>;

    fn read(&self, offset: u64, count: usize) -> io::Result<Vec<u8>>;
}

fn short_read(offset: u64, count: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("short read of {} bytes at {:#x}", count, offset),
    )
}

impl ByteSource for [u8] {
    fn length(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read(&self, offset: u64, count: usize) -> io::Result<Vec<u8>> {
        usize::try_from(offset)
            .ok()
            .and_then(|start| self.get(start..)?.get(..count))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| short_read(offset, count))
    }
}

impl ByteSource for Vec<u8> {
    fn length(&self) -> io::Result<u64> {
        self.as_slice().length()
    }

    fn read(&self, offset: u64, count: usize) -> io::Result<Vec<u8>> {
        self.as_slice().read(offset, count)
    }
}

impl<T: ByteSource + ?Sized> ByteSource for &T {
    fn length(&self) -> io::Result<u64> {
        (**self).length()
    }

    fn read(&self, offset: u64, count: usize) -> io::Result<Vec<u8>> {
        (**self).read(offset, count)
    }
}

/// Adapts any `Read + Seek` stream, such as a buffered file, to [`ByteSource`].
pub struct StreamSource<R> {
    inner: RefCell<R>,
    length: u64,
}

impl<R: Read + Seek> StreamSource<R> {
    pub fn new(mut inner: R) -> io::Result<Self> {
        let length = inner.seek(SeekFrom::End(0))?;

        Ok(Self {
            inner: RefCell::new(inner),
            length,
        })
    }
}

impl<R: Read + Seek> ByteSource for StreamSource<R> {
    fn length(&self) -> io::Result<u64> {
        Ok(self.length)
    }

    fn read(&self, offset: u64, count: usize) -> io::Result<Vec<u8>> {
        let mut inner = self.inner.borrow_mut();
        inner.seek(SeekFrom::Start(offset))?;

        let mut buf = vec![0; count];
        inner.read_exact(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn slice_reads_exact_windows() {
        let bytes: Vec<u8> = (0..16).collect();

        assert_eq!(bytes.length().unwrap(), 16);
        assert_eq!(bytes.read(4, 3).unwrap(), vec![4, 5, 6]);
        assert_eq!(bytes.read(16, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn slice_short_read_is_unexpected_eof() {
        let bytes = [0u8; 8];

        let err = bytes[..].read(6, 4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(bytes[..].read(100, 1).is_err());
    }

    #[test]
    fn stream_source_matches_slice() {
        let bytes: Vec<u8> = (0..=255).collect();
        let stream = StreamSource::new(Cursor::new(bytes.clone())).unwrap();

        assert_eq!(stream.length().unwrap(), 256);
        assert_eq!(stream.read(250, 6).unwrap(), bytes.read(250, 6).unwrap());
        // reads do not depend on previous cursor position
        assert_eq!(stream.read(0, 2).unwrap(), vec![0, 1]);
        assert_eq!(
            stream.read(255, 2).unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }
}
