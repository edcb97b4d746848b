use crate::error::{FrontierError, Result};
use rand::distributions::{Distribution, Uniform};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Long-only, fully-invested allocation in asset order.
pub type WeightVector = Vec<f64>;

/// Draws `n` independent U(0,1) values and divides each by their sum.
/// Not the flat Dirichlet law: mass concentrates toward equal weights.
pub fn sample_weights<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Result<WeightVector> {
    if n == 0 {
        return Err(FrontierError::invalid_parameter("cannot sample weights for zero assets"));
    }
    Ok(draw_normalized(n, rng))
}

fn draw_normalized<R: Rng + ?Sized>(n: usize, rng: &mut R) -> WeightVector {
    let uniform = Uniform::new(0.0, 1.0);
    loop {
        let raw: Vec<f64> = (0..n).map(|_| uniform.sample(rng)).collect();
        let total: f64 = raw.iter().sum();
        // all-zero draw: redraw
        if total > 0.0 {
            return raw.into_iter().map(|w| w / total).collect();
        }
    }
}

/// Seeded source of weight vectors for one basket size.
///
/// Stream 0 of a seed is what a sequential run consumes; parallel workers
/// take streams 0, 1, 2, ... of the same seed.
#[derive(Debug, Clone)]
pub struct SimplexSampler {
    assets: usize,
    seed: u64,
    rng: ChaCha8Rng,
}

impl SimplexSampler {
    /// `seed = None` draws a fresh seed from the thread RNG; it is kept so the
    /// run can be replayed.
    pub fn new(assets: usize, seed: Option<u64>) -> Result<Self> {
        let seed = seed.unwrap_or_else(rand::random::<u64>);
        Self::for_stream(assets, seed, 0)
    }

    pub fn for_stream(assets: usize, seed: u64, stream: u64) -> Result<Self> {
        if assets == 0 {
            return Err(FrontierError::invalid_parameter("Assets should be positive"));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(stream);
        Ok(SimplexSampler { assets, seed, rng })
    }

    pub fn assets(&self) -> usize {
        self.assets
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Advances the internal RNG.
    pub fn sample(&mut self) -> WeightVector {
        draw_normalized(self.assets, &mut self.rng)
    }

    /// Reseed the internal RNG mid-flight; the stream is reset to 0.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }
}
