use rand::Rng;

const CHROME_VERSIONS: [&str; 8] = [
    "133.0.6943.88",
    "132.0.6834.110",
    "131.0.6778.108",
    "130.0.6723.117",
    "129.0.6668.89",
    "128.0.6613.138",
    "127.0.6533.119",
    "126.0.6478.182",
];

const FIREFOX_VERSIONS: [&str; 6] = ["133.0", "132.0", "131.0", "130.0", "129.0", "128.0"];

const EDGE_VERSIONS: [&str; 4] = [
    "133.0.3048.56",
    "132.0.2957.63",
    "131.0.2903.112",
    "130.0.2849.80",
];

// 證交所的 MIS 頁面對行動裝置會導到不同版型，只用桌面版
const OS_STRINGS: [&str; 5] = [
    "Windows NT 10.0; Win64; x64",
    "Windows NT 11.0; Win64; x64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "X11; Linux x86_64",
    "X11; Ubuntu; Linux x86_64",
];

fn pick<'a>(rng: &mut impl Rng, items: &[&'a str]) -> &'a str {
    items[rng.random_range(0..items.len())]
}

fn gen_chrome_ua(rng: &mut impl Rng) -> String {
    format!(
        "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{} Safari/537.36",
        pick(rng, &OS_STRINGS),
        pick(rng, &CHROME_VERSIONS)
    )
}

fn gen_firefox_ua(rng: &mut impl Rng) -> String {
    let version = pick(rng, &FIREFOX_VERSIONS);
    format!(
        "Mozilla/5.0 ({}; rv:{}) Gecko/20100101 Firefox/{}",
        pick(rng, &OS_STRINGS),
        version,
        version
    )
}

fn gen_edge_ua(rng: &mut impl Rng) -> String {
    let edge = pick(rng, &EDGE_VERSIONS);
    let chrome = edge.split('.').next().unwrap_or("133");
    format!(
        "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{}.0.0.0 Safari/537.36 Edg/{}",
        pick(rng, &OS_STRINGS),
        chrome,
        edge
    )
}

/// 隨機產生一組桌面瀏覽器的 User-Agent
pub fn gen_random_ua() -> String {
    let mut rng = rand::rng();
    match rng.random_range(0..3) {
        0 => gen_firefox_ua(&mut rng),
        1 => gen_edge_ua(&mut rng),
        _ => gen_chrome_ua(&mut rng),
    }
}
