fn main() {
  bazaar::main();
}
