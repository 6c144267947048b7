use liftcore::model::WingProfile;

/// Symmetric NACA four-digit section, used when no profile file is configured.
///
/// Points are cosine-spaced from the leading edge; the trailing edge is
/// closed so both surfaces end at `(1, 0)`.
pub fn symmetric_profile(thickness: f64, points: usize) -> WingProfile {
    let points = points.max(2);
    let top: Vec<(f64, f64)> = (0..points)
        .map(|i| {
            let beta = std::f64::consts::PI * i as f64 / (points - 1) as f64;
            let x = 0.5 * (1.0 - beta.cos());
            (x, half_thickness(thickness, x))
        })
        .collect();
    let bottom = top.iter().map(|&(x, y)| (x, -y)).collect();
    WingProfile {
        name: format!("NACA00{:02}", (thickness * 100.0).round() as u32),
        top,
        bottom,
    }
}

fn half_thickness(thickness: f64, x: f64) -> f64 {
    5.0 * thickness
        * (0.2969 * x.sqrt() - 0.1260 * x - 0.3516 * x.powi(2) + 0.2843 * x.powi(3)
            - 0.1036 * x.powi(4))
}
