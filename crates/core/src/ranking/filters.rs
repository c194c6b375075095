use super::QualityFilters;

impl QualityFilters {
    /// Codec exclusions checked against a raw name.
    pub fn allows_format(&self, name: &str) -> bool {
        if self.disable_hevc {
            let squashed: String = name
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if ["x265", "h265", "hevc"].iter().any(|t| squashed.contains(t)) {
                return false;
            }
        }
        true
    }

    /// Quality exclusions checked against a quality label.
    pub fn allows_quality(&self, label: &str) -> bool {
        if self.disable_4k && label.contains("4K") {
            return false;
        }
        if self.disable_cam && label.contains("CAM") {
            return false;
        }
        if self.disable_hdr && (label.contains("HDR") || label.contains("Dolby Vision")) {
            return false;
        }
        if self.disable_3d && label.contains("3D") {
            return false;
        }
        true
    }
}
