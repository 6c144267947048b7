pub struct StatsHelper;

impl StatsHelper {
    /// `count` evenly spaced values from `start` to `end`, both included.
    pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
        match count {
            0 => Vec::new(),
            1 => vec![start],
            _ => {
                let step = (end - start) / (count - 1) as f64;
                let mut values: Vec<f64> = (0..count).map(|i| start + step * i as f64).collect();
                values[count - 1] = end;
                values
            }
        }
    }

    pub fn mean(samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }

    pub fn diff(values: &[f64]) -> Vec<f64> {
        values.windows(2).map(|pair| pair[1] - pair[0]).collect()
    }
}
