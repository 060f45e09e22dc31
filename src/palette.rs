use plotters::style::RGBColor;

/// Categorical palette, cycled when there are more keys than colors
#[derive(Debug, Clone)]
pub struct ColorPalette {
    colors: Vec<RGBColor>,
}

impl ColorPalette {
    /// The "tab10" categorical palette
    pub fn category10() -> Self {
        Self {
            colors: vec![
                RGBColor(31, 119, 180),
                RGBColor(255, 127, 14),
                RGBColor(44, 160, 44),
                RGBColor(214, 39, 40),
                RGBColor(148, 103, 189),
                RGBColor(140, 86, 75),
                RGBColor(227, 119, 194),
                RGBColor(127, 127, 127),
                RGBColor(188, 189, 34),
                RGBColor(23, 190, 207),
            ],
        }
    }

    /// ColorBrewer "Paired"
    pub fn paired() -> Self {
        Self {
            colors: vec![
                RGBColor(166, 206, 227),
                RGBColor(31, 120, 180),
                RGBColor(178, 223, 138),
                RGBColor(51, 160, 44),
                RGBColor(251, 154, 153),
                RGBColor(227, 26, 28),
                RGBColor(253, 191, 111),
                RGBColor(255, 127, 0),
                RGBColor(202, 178, 214),
                RGBColor(106, 61, 154),
                RGBColor(255, 255, 153),
                RGBColor(177, 89, 40),
            ],
        }
    }

    pub fn color(&self, index: usize) -> RGBColor {
        self.colors[index % self.colors.len()]
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// Piecewise-linear color ramp over [0, 1]
#[derive(Debug, Clone)]
pub struct Gradient {
    stops: Vec<(f64, RGBColor)>,
}

impl Gradient {
    /// Viridis sampled at nine stops
    pub fn viridis() -> Self {
        Self {
            stops: vec![
                (0.0, RGBColor(68, 1, 84)),
                (0.125, RGBColor(71, 44, 122)),
                (0.25, RGBColor(59, 81, 139)),
                (0.375, RGBColor(44, 113, 142)),
                (0.5, RGBColor(33, 144, 141)),
                (0.625, RGBColor(39, 173, 129)),
                (0.75, RGBColor(92, 200, 99)),
                (0.875, RGBColor(170, 220, 50)),
                (1.0, RGBColor(253, 231, 37)),
            ],
        }
    }

    /// Color at `t`, clamped to [0, 1]
    pub fn at(&self, t: f64) -> RGBColor {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

        for pair in self.stops.windows(2) {
            let (t0, c0) = pair[0];
            let (t1, c1) = pair[1];
            if t <= t1 {
                let w = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
                return RGBColor(lerp(c0.0, c1.0, w), lerp(c0.1, c1.1, w), lerp(c0.2, c1.2, w));
            }
        }
        self.stops[self.stops.len() - 1].1
    }

    /// Color for `value` normalized against [min, max]
    pub fn map(&self, value: f64, min: f64, max: f64) -> RGBColor {
        if max > min {
            self.at((value - min) / (max - min))
        } else {
            self.at(0.5)
        }
    }
}

fn lerp(a: u8, b: u8, w: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * w).round() as u8
}

/// Parse a color name or `#rrggbb` string
pub fn parse_color(color_str: &str) -> Option<RGBColor> {
    let named = match color_str.to_ascii_lowercase().as_str() {
        "red" => RGBColor(255, 0, 0),
        "green" => RGBColor(0, 128, 0),
        "blue" => RGBColor(0, 0, 255),
        "black" => RGBColor(0, 0, 0),
        "white" => RGBColor(255, 255, 255),
        "yellow" => RGBColor(255, 255, 0),
        "cyan" => RGBColor(0, 255, 255),
        "magenta" => RGBColor(255, 0, 255),
        "skyblue" => RGBColor(135, 206, 235),
        "coral" => RGBColor(255, 127, 80),
        "purple" => RGBColor(128, 0, 128),
        "teal" => RGBColor(0, 128, 128),
        "gray" | "grey" => RGBColor(128, 128, 128),
        "lightgray" | "lightgrey" => RGBColor(211, 211, 211),
        hex if hex.starts_with('#') && hex.len() == 7 && hex.is_ascii() => {
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            RGBColor(channel(1)?, channel(3)?, channel(5)?)
        }
        _ => return None,
    };
    Some(named)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color_named() {
        assert_eq!(parse_color("skyblue"), Some(RGBColor(135, 206, 235)));
        assert_eq!(parse_color("Coral"), Some(RGBColor(255, 127, 80)));
        assert_eq!(parse_color("nope"), None);
    }

    #[test]
    fn test_parse_color_hex() {
        assert_eq!(parse_color("#ff8000"), Some(RGBColor(255, 128, 0)));
        assert_eq!(parse_color("#zz8000"), None);
    }

    #[test]
    fn test_palette_cycles() {
        let p = ColorPalette::paired();
        assert_eq!(p.len(), 12);
        assert_eq!(p.color(0), p.color(12));
    }

    #[test]
    fn test_gradient_endpoints() {
        let g = Gradient::viridis();
        assert_eq!(g.at(0.0), RGBColor(68, 1, 84));
        assert_eq!(g.at(1.0), RGBColor(253, 231, 37));
        assert_eq!(g.at(2.0), RGBColor(253, 231, 37));
        assert_eq!(g.map(5.0, 5.0, 5.0), g.at(0.5));
    }
}
