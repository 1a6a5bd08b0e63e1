/// Encoding quality preset, mapped to a fixed `ffmpeg` output argument template.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// ProRes 422 in a QuickTime container.
    #[serde(alias = "prores422")]
    ProRes422,
    /// ProRes 4444 with alpha in a QuickTime container.
    #[serde(alias = "prores4444")]
    ProRes4444,
    /// H.264, yuv420p, default quality.
    #[default]
    H264Default,
    /// Lossless H.264, yuv420p.
    H264Lossless420,
    /// Lossless H.264, yuv444p.
    H264Lossless444,
    /// VP8 with alpha in a WebM container.
    Vp8Default,
}

impl Preset {
    /// Every preset, in declaration order.
    pub const ALL: [Preset; 6] = [
        Preset::ProRes422,
        Preset::ProRes4444,
        Preset::H264Default,
        Preset::H264Lossless420,
        Preset::H264Lossless444,
        Preset::Vp8Default,
    ];

    /// Output arguments placed between the `-i` input and the output path.
    pub fn output_args(self) -> &'static [&'static str] {
        match self {
            Preset::ProRes422 => &["-c:v", "prores_ks", "-pix_fmt", "yuv422p10le"],
            Preset::ProRes4444 => &["-c:v", "prores_ks", "-pix_fmt", "yuva444p10le"],
            Preset::H264Default => &["-c:v", "libx264", "-pix_fmt", "yuv420p"],
            Preset::H264Lossless420 => &[
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-preset",
                "ultrafast",
                "-crf",
                "0",
            ],
            Preset::H264Lossless444 => &[
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv444p",
                "-preset",
                "ultrafast",
                "-crf",
                "0",
            ],
            Preset::Vp8Default => &["-c:v", "libvpx", "-pix_fmt", "yuva420p"],
        }
    }

    /// Container file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Preset::ProRes422 | Preset::ProRes4444 => "mov",
            Preset::H264Default | Preset::H264Lossless420 | Preset::H264Lossless444 => "mp4",
            Preset::Vp8Default => "webm",
        }
    }

    /// Whether the output keeps the alpha channel.
    pub fn keeps_alpha(self) -> bool {
        matches!(self, Preset::ProRes4444 | Preset::Vp8Default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preset_names_a_codec_and_pixel_format() {
        for p in Preset::ALL {
            let args = p.output_args();
            assert!(args.contains(&"-c:v"), "{p:?}");
            assert!(args.contains(&"-pix_fmt"), "{p:?}");
        }
    }

    #[test]
    fn alpha_presets_pick_an_alpha_pixel_format() {
        for p in Preset::ALL {
            let args = p.output_args();
            let pix_fmt = args
                .iter()
                .position(|a| *a == "-pix_fmt")
                .map(|i| args[i + 1])
                .unwrap();
            assert_eq!(pix_fmt.starts_with("yuva"), p.keeps_alpha(), "{p:?}");
        }
        assert!(Preset::Vp8Default.keeps_alpha());
        assert!(!Preset::H264Lossless444.keeps_alpha());
    }

    #[test]
    fn extensions_follow_container() {
        assert_eq!(Preset::ProRes4444.extension(), "mov");
        assert_eq!(Preset::H264Lossless444.extension(), "mp4");
        assert_eq!(Preset::Vp8Default.extension(), "webm");
    }

    #[test]
    fn deserializes_from_snake_case() {
        let p: Preset = serde_json::from_str("\"h264_lossless420\"").unwrap();
        assert_eq!(p, Preset::H264Lossless420);
        let p: Preset = serde_json::from_str("\"prores4444\"").unwrap();
        assert_eq!(p, Preset::ProRes4444);
        assert_eq!(Preset::default(), Preset::H264Default);
    }
}
