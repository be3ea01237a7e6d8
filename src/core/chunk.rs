/// Payload of one asset: instance data plus its relocation and import tables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    pub instance: Vec<u8>,
    pub relocation: Vec<u8>,
    pub imports: Vec<u8>,
}

impl Chunk {
    /// Sum of all three segment sizes
    pub fn total_len(&self) -> usize {
        self.instance.len() + self.relocation.len() + self.imports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_len() {
        let chunk = Chunk {
            instance: vec![0; 10],
            relocation: Vec::new(),
            imports: vec![1, 2, 3],
        };
        assert_eq!(chunk.total_len(), 13);
        assert!(!chunk.is_empty());
        assert!(Chunk::default().is_empty());
    }
}
