// Format classification for display

use super::models::FormatDescriptor;

/// Display caps. These bound what is shown, never what is eligible for
/// selection during download.
pub const COMBINED_DISPLAY_CAP: usize = 15;
pub const VIDEO_DISPLAY_CAP: usize = 15;
pub const AUDIO_DISPLAY_CAP: usize = 10;

/// Segmented/live transport tags; such streams are not downloadable here
/// and are excluded from classification entirely.
const LIVE_PROTOCOLS: [&str; 3] = ["m3u8", "m3u8_native", "http_dash_segments"];

/// A strict partition of the downloadable formats.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedFormats {
    /// Single streams carrying both video and audio, tallest first
    pub combined: Vec<FormatDescriptor>,
    /// Video without audio, tallest first
    pub video_only: Vec<FormatDescriptor>,
    /// Audio without video, highest bitrate first
    pub audio_only: Vec<FormatDescriptor>,
}

impl ClassifiedFormats {
    /// Partition formats by codec-absence rules, dropping live/segmented
    /// protocols. Every retained descriptor lands in exactly one list.
    pub fn classify(formats: &[FormatDescriptor]) -> Self {
        let mut out = Self::default();

        for fmt in formats {
            if is_live_protocol(fmt) {
                continue;
            }

            match (fmt.has_video(), fmt.has_audio()) {
                (true, true) => out.combined.push(fmt.clone()),
                (true, false) => out.video_only.push(fmt.clone()),
                (false, true) => out.audio_only.push(fmt.clone()),
                (false, false) => {}
            }
        }

        out.combined
            .sort_by(|a, b| b.height.unwrap_or(0).cmp(&a.height.unwrap_or(0)));
        out.video_only
            .sort_by(|a, b| b.height.unwrap_or(0).cmp(&a.height.unwrap_or(0)));
        out.audio_only.sort_by(|a, b| {
            b.abr
                .unwrap_or(0.0)
                .partial_cmp(&a.abr.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        out
    }

    /// Capped views for presentation.
    pub fn combined_display(&self) -> &[FormatDescriptor] {
        capped(&self.combined, COMBINED_DISPLAY_CAP)
    }

    pub fn video_display(&self) -> &[FormatDescriptor] {
        capped(&self.video_only, VIDEO_DISPLAY_CAP)
    }

    pub fn audio_display(&self) -> &[FormatDescriptor] {
        capped(&self.audio_only, AUDIO_DISPLAY_CAP)
    }
}

fn is_live_protocol(fmt: &FormatDescriptor) -> bool {
    fmt.protocol
        .as_deref()
        .map_or(false, |p| LIVE_PROTOCOLS.contains(&p))
}

fn capped(list: &[FormatDescriptor], cap: usize) -> &[FormatDescriptor] {
    &list[..list.len().min(cap)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_format(id: &str, height: u32) -> FormatDescriptor {
        FormatDescriptor {
            format_id: id.to_string(),
            ext: "mp4".to_string(),
            vcodec: Some("avc1.4d401f".to_string()),
            acodec: Some("none".to_string()),
            height: Some(height),
            fps: Some(30.0),
            abr: None,
            tbr: Some(1500.0),
            filesize: Some(10_000_000),
            filesize_approx: None,
            protocol: Some("https".to_string()),
        }
    }

    fn audio_format(id: &str, abr: f32) -> FormatDescriptor {
        FormatDescriptor {
            format_id: id.to_string(),
            ext: "m4a".to_string(),
            vcodec: Some("none".to_string()),
            acodec: Some("mp4a.40.2".to_string()),
            height: None,
            fps: None,
            abr: Some(abr),
            tbr: None,
            filesize: Some(2_000_000),
            filesize_approx: None,
            protocol: Some("https".to_string()),
        }
    }

    fn combined_format(id: &str, height: u32) -> FormatDescriptor {
        FormatDescriptor {
            acodec: Some("mp4a.40.2".to_string()),
            ..video_format(id, height)
        }
    }

    #[test]
    fn test_strict_partition() {
        let formats = vec![
            video_format("v1", 1080),
            audio_format("a1", 128.0),
            combined_format("c1", 720),
        ];
        let classified = ClassifiedFormats::classify(&formats);

        let total = classified.combined.len()
            + classified.video_only.len()
            + classified.audio_only.len();
        assert_eq!(total, formats.len());
        assert_eq!(classified.video_only[0].format_id, "v1");
        assert_eq!(classified.audio_only[0].format_id, "a1");
        assert_eq!(classified.combined[0].format_id, "c1");
    }

    #[test]
    fn test_live_protocols_excluded() {
        let mut live = combined_format("live", 1080);
        live.protocol = Some("m3u8_native".to_string());
        let mut dash = video_format("dash", 720);
        dash.protocol = Some("http_dash_segments".to_string());

        let classified = ClassifiedFormats::classify(&[live, dash, audio_format("a1", 128.0)]);
        assert!(classified.combined.is_empty());
        assert!(classified.video_only.is_empty());
        assert_eq!(classified.audio_only.len(), 1);
    }

    #[test]
    fn test_sorted_descending() {
        let formats = vec![
            video_format("v360", 360),
            video_format("v1080", 1080),
            video_format("v720", 720),
            audio_format("a48", 48.0),
            audio_format("a160", 160.0),
        ];
        let classified = ClassifiedFormats::classify(&formats);

        let heights: Vec<u32> = classified
            .video_only
            .iter()
            .filter_map(|f| f.height)
            .collect();
        assert_eq!(heights, vec![1080, 720, 360]);

        let rates: Vec<f32> = classified.audio_only.iter().filter_map(|f| f.abr).collect();
        assert_eq!(rates, vec![160.0, 48.0]);
    }

    #[test]
    fn test_display_caps_do_not_shrink_partition() {
        let mut formats = Vec::new();
        for i in 0..20 {
            formats.push(video_format(&format!("v{}", i), 100 + i));
            formats.push(audio_format(&format!("a{}", i), 32.0 + i as f32));
        }
        let classified = ClassifiedFormats::classify(&formats);

        assert_eq!(classified.video_only.len(), 20);
        assert_eq!(classified.audio_only.len(), 20);
        assert_eq!(classified.video_display().len(), VIDEO_DISPLAY_CAP);
        assert_eq!(classified.audio_display().len(), AUDIO_DISPLAY_CAP);
        // Capped view keeps the best-ranked entries
        assert_eq!(classified.video_display()[0].height, Some(119));
    }
}
