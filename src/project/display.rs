//! Plot-ready curves for a specimen.
//!
//! Everything here is computed from the stored data on demand and returned as
//! new point lists; the stored patterns are never modified.

use super::project::Project;
use super::specimen::Specimen;
use crate::data::pattern::XyPattern;
use crate::error::Result;

/// A curve in display coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayCurve {
    pub label: String,
    pub color: String,
    pub line_width: f64,
    pub points: Vec<[f64; 2]>,
}

/// Everything drawn for one specimen
#[derive(Debug, Clone, PartialEq)]
pub struct SpecimenDisplay {
    pub scale: f64,
    pub offset: f64,
    pub experimental: Option<DisplayCurve>,
    pub calculated: Option<DisplayCurve>,
    /// Pending background, drawn under the experimental curve
    pub background: Option<Vec<[f64; 2]>>,
    /// Pending smoothing result
    pub smoothing_preview: Option<Vec<[f64; 2]>>,
    /// Experimental curve with the pending shift applied
    pub shifted: Option<Vec<[f64; 2]>>,
    /// Expected position of the calibration reflection (°2θ)
    pub shift_reference_position: Option<f64>,
    /// Visible markers as (label, position)
    pub markers: Vec<(String, f64)>,
    /// Where the specimen label is drawn (x, y)
    pub label_anchor: [f64; 2],
}

/// Scale `y` values and lift them by `offset`
pub fn scaled_points(x: &[f64], y: &[f64], scale: f64, offset: f64) -> Vec<[f64; 2]> {
    x.iter()
        .zip(y.iter())
        .map(|(&xv, &yv)| [xv, yv * scale + offset])
        .collect()
}

pub fn display_curve(pattern: &XyPattern, scale: f64, offset: f64) -> DisplayCurve {
    DisplayCurve {
        label: pattern.label_text(),
        color: pattern.color.clone(),
        line_width: pattern.line_width,
        points: scaled_points(pattern.x(), pattern.y(), scale, offset),
    }
}

/// Build the display curves for the specimen at `index`
pub fn specimen_display(project: &Project, index: usize) -> Result<SpecimenDisplay> {
    let specimen = project.specimen(index)?;
    let (scale, offset) = project.get_scale_factor(index)?;
    Ok(build(project, specimen, scale, offset))
}

/// Display curves for every specimen, in project order
pub fn project_display(project: &Project) -> Result<Vec<SpecimenDisplay>> {
    (0..project.specimens().len())
        .map(|i| specimen_display(project, i))
        .collect()
}

fn build(project: &Project, specimen: &Specimen, scale: f64, offset: f64) -> SpecimenDisplay {
    let exp = &specimen.experimental;
    let x = exp.x();

    let experimental = (specimen.display_experimental && !exp.is_empty())
        .then(|| display_curve(exp, scale, offset));
    let calculated = (specimen.display_calculated && !specimen.calculated.is_empty())
        .then(|| display_curve(&specimen.calculated, scale, offset));

    // a background that doesn't fit the grid is simply not drawn
    let background = match specimen.background.evaluate(exp.len()) {
        Ok(Some(bg)) => Some(scaled_points(x, &bg, scale, offset)),
        _ => None,
    };

    let smoothing_preview = specimen
        .smoothing_preview()
        .map(|y| scaled_points(x, &y, scale, offset));

    let (shifted, shift_reference_position) = if specimen.shift_value != 0.0 {
        let moved: Vec<f64> = x.iter().map(|v| v - specimen.shift_value).collect();
        (
            Some(scaled_points(&moved, exp.y(), scale, offset)),
            specimen.shift_reference.position(project.goniometer()).ok(),
        )
    } else {
        (None, None)
    };

    let markers = specimen
        .markers
        .iter()
        .filter(|m| m.visible)
        .map(|m| (m.label.clone(), m.position))
        .collect();

    let label_x = project.axes().xmin.max(x.first().copied().unwrap_or(0.0));
    let d = project.display();
    let label_anchor = [label_x, offset + d.label_pos * d.plot_offset];

    SpecimenDisplay {
        scale,
        offset,
        experimental,
        calculated,
        background,
        smoothing_preview,
        shifted,
        shift_reference_position,
        markers,
        label_anchor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::markers::Marker;
    use crate::pipeline::background::Background;

    fn project() -> Project {
        let mut p = Project::new("display");
        for (i, peak) in [200.0, 50.0].iter().enumerate() {
            let x: Vec<f64> = (0..21).map(|k| 19.0 + k as f64 * 0.2).collect();
            let y: Vec<f64> = (0..21)
                .map(|k| if k == 10 { *peak } else { 10.0 + k as f64 })
                .collect();
            let pattern = XyPattern::from_xy("exp", x, y).unwrap();
            p.add_specimen(Specimen::from_pattern(&format!("s{}", i), "", pattern));
        }
        p
    }

    #[test]
    fn test_normalisation_does_not_touch_data() {
        let p = project();
        let before = p.specimens()[1].experimental.clone();
        let d = specimen_display(&p, 1).unwrap();
        assert_eq!(p.specimens()[1].experimental, before);

        let curve = d.experimental.unwrap();
        // multi-normalised: divided by the project maximum, lifted by one offset step
        assert!((curve.points[10][1] - (50.0 / 200.0 + 0.75)).abs() < 1e-12);
        assert_eq!(curve.points.len(), before.len());
        assert!(d.calculated.is_none());
    }

    #[test]
    fn test_overlays() {
        let mut p = project();
        p.modify_specimen(0, |s, _| {
            s.background = Background::Constant { offset: 10.0 };
            s.smoothing_degree = 2;
            s.shift_value = 0.1;
            s.markers.push(Marker::new("shown", 20.0));
            let mut hidden = Marker::new("hidden", 21.0);
            hidden.visible = false;
            s.markers.push(hidden);
            Ok(())
        })
        .unwrap();

        let d = specimen_display(&p, 0).unwrap();
        let bg = d.background.unwrap();
        assert!((bg[0][1] - 10.0 / 200.0).abs() < 1e-12);
        assert_eq!(d.smoothing_preview.unwrap().len(), 21);
        let shifted = d.shifted.unwrap();
        assert!((shifted[0][0] - 18.9).abs() < 1e-12);
        assert!(d.shift_reference_position.is_some());
        assert_eq!(d.markers, vec![("shown".to_string(), 20.0)]);
    }

    #[test]
    fn test_project_display_order() {
        let p = project();
        let all = project_display(&p).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].offset, 0.0);
        assert_eq!(all[1].offset, 0.75);
    }
}
