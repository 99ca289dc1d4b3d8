//! 팝업 위치/크기 계산과 모니터 영역

use crate::config::MonitorConf;

/// 모니터 하단에서 팝업까지의 여백 (논리 좌표)
pub const BOTTOM_PADDING: i32 = 50;

/// 화면 사각형 (좌상단 원점, 논리 좌표)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left as f64 && x < self.right as f64 && y >= self.top as f64 && y < self.bottom as f64
    }

    /// 하단 좌측 원점 좌표계(AppKit)의 프레임을 좌상단 원점으로 변환
    pub fn from_bottom_left(x: f64, y: f64, width: f64, height: f64, primary_height: f64) -> Rect {
        let top = primary_height - (y + height);
        Rect {
            left: x.floor() as i32,
            top: top.floor() as i32,
            right: (x + width).floor() as i32,
            bottom: (top + height).floor() as i32,
        }
    }
}

/// 팝업을 배치할 기준 영역
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorArea {
    /// 모니터를 특정하지 못함: (0, 0) 기준 전체 화면 크기 사용
    FullScreen,
    Bounds(Rect),
}

/// 모니터 선택 방식에 따라 기준 영역을 찾는 외부 협력자
pub trait MonitorLocator: Send + Sync {
    fn locate(&self, mode: MonitorConf) -> MonitorArea;
}

/// 팝업 윈도우 위치/크기 (좌상단 원점)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// 모니터 가로 중앙, 하단에서 BOTTOM_PADDING 위에 ratio 크기로 배치
///
/// `screen`은 FullScreen일 때 쓰는 (너비, 높이).
pub fn compute_geometry(area: MonitorArea, screen: (i32, i32), ratio: f64) -> Geometry {
    let (left, top, w, h) = match area {
        MonitorArea::FullScreen => (0, 0, screen.0, screen.1),
        MonitorArea::Bounds(rect) => (rect.left, rect.top, rect.width(), rect.height()),
    };
    let (w, h) = (w as f64, h as f64);

    let width = (w * ratio).floor();
    let height = (h * ratio).floor();
    let x = (w / 2.0 - width / 2.0).floor() as i32 + left;
    let y = (h - height - BOTTOM_PADDING as f64).floor() as i32 + top;

    Geometry {
        x,
        y,
        width: width as i32,
        height: height as i32,
    }
}

/// 점을 포함하는 모니터 (없으면 가장 가까운 모니터)
pub fn monitor_at(monitors: &[Rect], x: f64, y: f64) -> Option<Rect> {
    if let Some(rect) = monitors.iter().find(|r| r.contains(x, y)) {
        return Some(*rect);
    }
    monitors.iter().copied().min_by(|a, b| {
        distance_sq(a, x, y)
            .partial_cmp(&distance_sq(b, x, y))
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

fn distance_sq(rect: &Rect, x: f64, y: f64) -> f64 {
    let dx = (rect.left as f64 - x).max(0.0).max(x - rect.right as f64);
    let dy = (rect.top as f64 - y).max(0.0).max(y - rect.bottom as f64);
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(left: i32, top: i32, width: i32, height: i32) -> Rect {
        Rect {
            left,
            top,
            right: left + width,
            bottom: top + height,
        }
    }

    #[test]
    fn test_primary_fhd_eighth() {
        let g = compute_geometry(MonitorArea::Bounds(rect(0, 0, 1920, 1080)), (0, 0), 0.125);
        assert_eq!(
            g,
            Geometry {
                x: 840,
                y: 895,
                width: 240,
                height: 135
            }
        );
    }

    #[test]
    fn test_full_screen_uses_screen_size() {
        let g = compute_geometry(MonitorArea::FullScreen, (1920, 1080), 0.125);
        assert_eq!((g.x, g.y, g.width, g.height), (840, 895, 240, 135));
    }

    #[test]
    fn test_offset_monitor() {
        // 주 모니터 오른쪽의 2560x1440 모니터
        let g = compute_geometry(MonitorArea::Bounds(rect(1920, -200, 2560, 1440)), (0, 0), 0.25);
        assert_eq!(g.width, 640);
        assert_eq!(g.height, 360);
        assert_eq!(g.x, 960 + 1920);
        assert_eq!(g.y, 1440 - 360 - 50 - 200);
    }

    #[test]
    fn test_floor_semantics() {
        // W*r = 320.1666.. -> 320, W/2 - w/2 = 960.5 - 160 = 800.5 -> 800
        let g = compute_geometry(MonitorArea::Bounds(rect(0, 0, 1921, 1081)), (0, 0), 1.0 / 6.0);
        assert_eq!(g.width, 320);
        assert_eq!(g.height, 180);
        assert_eq!(g.x, 800);
        assert_eq!(g.y, 1081 - 180 - 50);

        // 홀수 너비: floor(1928/2 - 241/2) = floor(843.5) = 843
        let g = compute_geometry(MonitorArea::Bounds(rect(0, 0, 1928, 1080)), (0, 0), 0.125);
        assert_eq!(g.width, 241);
        assert_eq!(g.x, 843);
    }

    #[test]
    fn test_formula_over_grid() {
        let monitors = [
            rect(0, 0, 1920, 1080),
            rect(-1280, 0, 1280, 1024),
            rect(1920, 300, 3840, 2160),
            rect(0, -900, 1440, 900),
        ];
        for m in monitors {
            for r in [0.1, 0.125, 1.0 / 6.0, 0.25, 0.5, 1.0] {
                let g = compute_geometry(MonitorArea::Bounds(m), (0, 0), r);
                let (w, h) = (m.width() as f64, m.height() as f64);
                assert_eq!(g.width, (w * r).floor() as i32);
                assert_eq!(g.height, (h * r).floor() as i32);
                assert_eq!(g.x, (w / 2.0 - g.width as f64 / 2.0).floor() as i32 + m.left);
                assert_eq!(g.y, (h - g.height as f64 - 50.0).floor() as i32 + m.top);
            }
        }
    }

    #[test]
    fn test_from_bottom_left() {
        // 주 모니터 1080 높이, 그 위에 붙은 1440x900 모니터
        let r = Rect::from_bottom_left(0.0, 1080.0, 1440.0, 900.0, 1080.0);
        assert_eq!(r, rect(0, -900, 1440, 900));

        let primary = Rect::from_bottom_left(0.0, 0.0, 1920.0, 1080.0, 1080.0);
        assert_eq!(primary, rect(0, 0, 1920, 1080));
    }

    #[test]
    fn test_monitor_at() {
        let monitors = [rect(0, 0, 1920, 1080), rect(1920, 0, 2560, 1440)];
        assert_eq!(monitor_at(&monitors, 100.0, 100.0), Some(monitors[0]));
        assert_eq!(monitor_at(&monitors, 2000.0, 1200.0), Some(monitors[1]));
        // 어느 모니터에도 없으면 가장 가까운 모니터
        assert_eq!(monitor_at(&monitors, 5000.0, 10.0), Some(monitors[1]));
        assert_eq!(monitor_at(&[], 0.0, 0.0), None);
    }
}
