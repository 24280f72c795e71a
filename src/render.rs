use std::path::{Path, PathBuf};

use tracing::info;

use crate::{
    colors::Gradient,
    error::Result,
    features::FeatureSet,
    keypoints::KeyPointShape,
    matching::draw_matches,
    model::Image,
    pipeline::PipelineOutput,
};

/// A named picture produced by a run, ready to be shown or written out.
#[derive(Clone, Debug)]
pub struct Surface {
    pub name: String,
    pub image: Image<u8>,
}

impl Surface {
    pub fn new(name: impl Into<String>, image: Image<u8>) -> Self {
        return Surface { name: name.into(), image };
    }

    /// `featImg #13` becomes `featImg_13.png`.
    pub fn file_name(&self) -> String {
        let stem: String = self.name
            .replace(" #", "_")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();

        return format!("{stem}.png");
    }
}

/// Region copy with every keypoint drawn with its scale circle and orientation.
fn feature_image(region: &Image<u8>, features: &FeatureSet) -> Image<u8> {
    let mut canvas = region.to_three_channels();
    let gradient = Gradient::rainbow();
    let n = features.len().max(1) as f32;

    for (i, kp) in features.keypoints.iter().enumerate() {
        kp.draw(&mut canvas, gradient.get_color(i as f32 / n), KeyPointShape::Rich);
    }

    return canvas;
}

/// Every picture of a run in display order: both inputs, then per region pair
/// the two keypoint overlays, all matches and the filtered matches.
///
/// Pair suffixes are the region index, so `featImg #12` is the first image's region 2.
pub fn build_surfaces(first: &Image<u8>, second: &Image<u8>, output: &PipelineOutput) -> Vec<Surface> {
    let mut surfaces = vec!(
        Surface::new("origin #1", first.clone()),
        Surface::new("origin #2", second.clone()),
    );

    for report in &output.reports {
        let a = &output.regions_1[report.index].image;
        let b = &output.regions_2[report.index].image;
        let i = report.index;

        surfaces.push(Surface::new(format!("featImg #1{i}"), feature_image(a, &report.features_1)));
        surfaces.push(Surface::new(format!("featImg #2{i}"), feature_image(b, &report.features_2)));
        surfaces.push(Surface::new(
            format!("matchImg #{i}"),
            draw_matches(a, &report.features_1, b, &report.features_2, &report.result.matches, false),
        ));
        surfaces.push(Surface::new(
            format!("goodMatch #{i}"),
            draw_matches(a, &report.features_1, b, &report.features_2, &report.result.good_matches, true),
        ));
    }

    return surfaces;
}

/// Writes every surface as a PNG under `dir`, creating it if needed.
pub fn save_surfaces<P: AsRef<Path>>(surfaces: &[Surface], dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(surfaces.len());

    for surface in surfaces {
        let path = dir.join(surface.file_name());
        surface.image.save(&path)?;
        written.push(path);
    }

    info!(count = written.len(), dir = %dir.display(), "saved surfaces");

    return Ok(written);
}
