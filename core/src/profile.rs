//! Airfoil coordinate files in Selig or Lednicer `.dat` layout.

use crate::model::{Surface, WingProfile};
use crate::prelude::ProfileError;
use std::fs;
use std::path::Path;

pub fn load_profile(path: impl AsRef<Path>) -> Result<WingProfile, ProfileError> {
    let text = fs::read_to_string(path.as_ref())?;
    parse_profile(&text)
}

/// Parses a profile. The first token of the first line is the name.
///
/// Lednicer files carry the point counts on the second line (values above 1)
/// and list the upper surface then the lower surface, both from the leading
/// edge. Selig files run from the trailing edge over the upper surface to
/// `x == 0` and back along the lower surface.
pub fn parse_profile(text: &str) -> Result<WingProfile, ProfileError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let name = lines
        .next()
        .and_then(|(_, line)| line.split_whitespace().next())
        .ok_or(ProfileError::Empty)?
        .to_string();

    let mut rows = Vec::new();
    for (number, line) in lines {
        rows.push((number, parse_pair(number, line)?));
    }
    let first = rows.first().ok_or(ProfileError::Empty)?;

    let (top, bottom) = if first.1 .0 > 1.0 {
        let upper_count = first.1 .0 as usize;
        let points: Vec<(f64, f64)> = rows[1..].iter().map(|(_, point)| *point).collect();
        if upper_count < 2 || upper_count >= points.len() {
            return Err(ProfileError::Parse {
                line: first.0,
                message: format!("upper surface count {upper_count} does not fit the file"),
            });
        }
        let (upper, lower) = points.split_at(upper_count);
        (upper.to_vec(), lower.to_vec())
    } else {
        let points: Vec<(f64, f64)> = rows.iter().map(|(_, point)| *point).collect();
        let leading = points
            .iter()
            .position(|&(x, _)| x == 0.0)
            .ok_or(ProfileError::Parse {
                line: first.0,
                message: "no leading-edge point at x = 0".into(),
            })?;
        let mut upper = points[..=leading].to_vec();
        upper.reverse();
        (upper, points[leading..].to_vec())
    };

    for (surface, curve) in [(Surface::Top, &top), (Surface::Bottom, &bottom)] {
        if curve.len() < 2 || curve.windows(2).any(|pair| pair[1].0 <= pair[0].0) {
            return Err(ProfileError::NotIncreasing(surface));
        }
    }

    Ok(WingProfile { name, top, bottom })
}

fn parse_pair(line: usize, text: &str) -> Result<(f64, f64), ProfileError> {
    let mut tokens = text.split_whitespace();
    let mut next = |what: &str| {
        let token = tokens.next().ok_or_else(|| ProfileError::Parse {
            line,
            message: format!("missing {what}"),
        })?;
        token.parse::<f64>().map_err(|_| ProfileError::Parse {
            line,
            message: format!("{what} {token:?} is not a number"),
        })
    };
    let x = next("x")?;
    let y = next("y")?;
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SELIG: &str = "NACA0012 symmetric\n\
        1.0 0.0\n\
        0.5 0.05\n\
        0.0 0.0\n\
        0.5 -0.05\n\
        1.0 0.0\n";

    const LEDNICER: &str = "NACA22112b lednicer\n\
        3. 3.\n\
        \n\
        0.0 0.0\n\
        0.5 0.06\n\
        1.0 0.0\n\
        \n\
        0.0 0.0\n\
        0.5 -0.04\n\
        1.0 0.0\n";

    #[test]
    fn selig_upper_surface_is_reversed() {
        let wing = parse_profile(SELIG).unwrap();
        assert_eq!(wing.name, "NACA0012");
        assert_eq!(wing.top, vec![(0.0, 0.0), (0.5, 0.05), (1.0, 0.0)]);
        assert_eq!(wing.bottom, vec![(0.0, 0.0), (0.5, -0.05), (1.0, 0.0)]);
    }

    #[test]
    fn lednicer_uses_the_upper_count() {
        let wing = parse_profile(LEDNICER).unwrap();
        assert_eq!(wing.name, "NACA22112b");
        assert_eq!(wing.top, vec![(0.0, 0.0), (0.5, 0.06), (1.0, 0.0)]);
        assert_eq!(wing.bottom, vec![(0.0, 0.0), (0.5, -0.04), (1.0, 0.0)]);
    }

    #[test]
    fn decreasing_lower_surface_is_rejected() {
        let text = "BROKEN\n1.0 0.0\n0.0 0.0\n0.6 -0.05\n0.4 -0.04\n";
        assert!(matches!(
            parse_profile(text),
            Err(ProfileError::NotIncreasing(Surface::Bottom))
        ));
    }

    #[test]
    fn garbage_reports_its_line() {
        let text = "BROKEN\n1.0 0.0\n0.5 abc\n";
        assert!(matches!(
            parse_profile(text),
            Err(ProfileError::Parse { line: 3, .. })
        ));
        assert!(matches!(parse_profile(""), Err(ProfileError::Empty)));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SELIG.as_bytes()).unwrap();
        let wing = load_profile(file.path()).unwrap();
        assert_eq!(wing.top.len(), 3);
        assert!(wing.validate().is_ok());
    }
}
