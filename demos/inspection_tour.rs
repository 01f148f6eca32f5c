use grid_tour::{plan_route, PlannerConfig, PoiGrid};

// Plans an inspection round over a small facility floor: four checkpoints
// in the corners, a storage block and a partition wall in the way. With an
// LKH executable on the path the visiting order comes from the external
// solver, otherwise the built-in greedy fallback kicks in.

fn main() -> Result<(), grid_tour::Error> {
    let grid = PoiGrid::from_ascii(&[
        "..........",
        ".P......P.",
        "....##....",
        "....##....",
        "..........",
        ".######...",
        "..........",
        ".P......P.",
        "..........",
        "..........",
    ], 50.0);

    println!("{}", grid);

    let plan = plan_route(&grid, &PlannerConfig::default())?;

    println!("visiting order: {:?}", plan.tour.order);
    println!("tour distance:  {}", plan.tour.total_distance);
    println!(
        "route:          {} cells, cost {}",
        plan.route.points.len(),
        plan.route.total_cost
    );
    for window in plan.route.points.chunks(8) {
        let row: Vec<String> = window.iter().map(|p| format!("({}, {})", p.x, p.y)).collect();
        println!("  {}", row.join(" "));
    }
    Ok(())
}
