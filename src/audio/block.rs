/// One fixed-size block of mono PCM, stamped with its playback time.
#[derive(Clone, Debug)]
pub struct AudioBlock {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Playback time of the first sample in seconds.
    pub time: f64,
}

impl AudioBlock {
    pub fn new(samples: Vec<f32>, sample_rate: u32, time: f64) -> Self {
        Self {
            samples,
            sample_rate,
            time,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration covered by this block in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// RMS energy of the block.
    pub fn energy(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        (self.samples.iter().map(|s| s * s).sum::<f32>() / self.samples.len() as f32).sqrt()
    }
}

/// Splits a decoded track into consecutive fixed-size blocks.
///
/// The last block is zero-padded to the full block size.
pub struct BlockSource<'a> {
    samples: &'a [f32],
    sample_rate: u32,
    block_size: usize,
    pos: usize,
}

impl<'a> BlockSource<'a> {
    pub fn new(samples: &'a [f32], sample_rate: u32, block_size: usize) -> Self {
        Self {
            samples,
            sample_rate,
            block_size: block_size.max(1),
            pos: 0,
        }
    }

    pub fn block_count(&self) -> usize {
        self.samples.len().div_ceil(self.block_size)
    }
}

impl Iterator for BlockSource<'_> {
    type Item = AudioBlock;

    fn next(&mut self) -> Option<AudioBlock> {
        if self.pos >= self.samples.len() {
            return None;
        }
        let end = (self.pos + self.block_size).min(self.samples.len());
        let mut block = self.samples[self.pos..end].to_vec();
        block.resize(self.block_size, 0.0);

        let time = self.pos as f64 / self.sample_rate as f64;
        self.pos = end;
        Some(AudioBlock::new(block, self.sample_rate, time))
    }
}
