use crate::braille::BrailleCanvas;

/// Draw a filled disc
pub fn draw_circle(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                canvas.set_dot(cx + dx, cy + dy);
            }
        }
    }
}

/// Draw the outline band between `inner` and `outer` radius
pub fn draw_ring(canvas: &mut BrailleCanvas, cx: i32, cy: i32, inner: i32, outer: i32) {
    let (inner_sq, outer_sq) = (inner * inner, outer * outer);
    for dy in -outer..=outer {
        for dx in -outer..=outer {
            let d = dx * dx + dy * dy;
            if d > inner_sq && d <= outer_sq {
                canvas.set_dot(cx + dx, cy + dy);
            }
        }
    }
}
