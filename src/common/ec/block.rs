use super::encoder::ecc;

// Codeword block
//------------------------------------------------------------------------------

/// One error correction block: data codewords followed by ec codewords.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Block {
    data: Vec<u8>,
    // Data length; the tail is ec
    dlen: usize,
}

impl Block {
    pub fn new(raw: &[u8], len: usize) -> Self {
        let dlen = raw.len();
        debug_assert!(dlen < len, "Block must have room for ec codewords");

        let mut data = raw.to_vec();
        data.extend(ecc(raw, len - dlen));
        Self { data, dlen }
    }

    pub fn with_encoded(encoded: &[u8], dlen: usize) -> Self {
        debug_assert!(dlen <= encoded.len(), "Data length exceeds block length");
        Self { data: encoded.to_vec(), dlen }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn ec_len(&self) -> usize {
        self.data.len() - self.dlen
    }

    pub fn data_len(&self) -> usize {
        self.dlen
    }

    pub fn full(&self) -> &[u8] {
        &self.data
    }

    pub fn full_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlen]
    }

    pub fn ecc(&self) -> &[u8] {
        &self.data[self.dlen..]
    }
}
